use super::clauses::{Filter, PayloadSlot, Return, Trailer, payload_methods, trailer_methods};
use super::{Statement, Target};
use crate::display::DisplayContext;
use crate::error::UsageError;
use crate::expr::Expr;
use crate::node::{Context, Node};
use crate::schema::Database;
use crate::types::Type;

/// `UPSERT [ONLY] <target> [payload] [WHERE] [RETURN] [TIMEOUT] [PARALLEL]`
///
/// Like [`super::Update`], but creates the record when it does not exist.
#[derive(Debug, Clone)]
pub struct Upsert {
    ctx: Context,
    target: Target,
    record: Expr,
    input: Type,
    only: bool,
    payload: PayloadSlot,
    filter: Filter,
    trailer: Trailer,
}

impl Database {
    pub fn upsert(&self, target: impl Into<Target>) -> Result<Upsert, UsageError> {
        let target = target.into();
        let row = target.row_type(self)?;
        let input = target.input_type(self)?;
        let ctx = Context::new(self.clone());
        let record = Expr::from(Node::record(ctx.clone(), row));
        Ok(Upsert {
            ctx,
            target,
            record,
            input,
            only: false,
            payload: PayloadSlot::default(),
            filter: Filter::default(),
            trailer: Trailer::default(),
        })
    }
}

impl Upsert {
    payload_methods!(set);
    payload_methods!(content);
    payload_methods!(merge);
    payload_methods!(patch);
    payload_methods!(replace);
    trailer_methods!(only);

    pub fn filter(mut self, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let cond = f(&self.record);
        self.filter.push(cond);
        self
    }
}

impl Statement for Upsert {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn kind(&self) -> &'static str {
        "UPSERT"
    }

    fn render_statement(&self, d: &mut DisplayContext) -> String {
        let mut out = String::from("UPSERT ");
        if self.only {
            out.push_str("ONLY ");
        }
        out.push_str(&self.target.render(d));
        self.payload.render(d, &mut out);
        self.filter.render(d, &mut out);
        self.trailer.render(d, &mut out);
        out
    }

    fn output(&self) -> Type {
        self.trailer.output(Return::After, self.record.ty(), self.only)
    }

    fn checks_output(&self) -> bool {
        self.trailer.checks_output()
    }
}
