use super::clauses::{PayloadSlot, Return, Trailer, payload_methods, trailer_methods};
use super::{Statement, Target};
use crate::display::DisplayContext;
use crate::error::UsageError;
use crate::expr::Expr;
use crate::node::{Context, Node};
use crate::schema::Database;
use crate::types::Type;

/// `CREATE [ONLY] <target> [SET | CONTENT] [RETURN] [TIMEOUT] [PARALLEL]`
#[derive(Debug, Clone)]
pub struct Create {
    ctx: Context,
    target: Target,
    record: Expr,
    input: Type,
    only: bool,
    payload: PayloadSlot,
    trailer: Trailer,
}

impl Database {
    pub fn create(&self, target: impl Into<Target>) -> Result<Create, UsageError> {
        let target = target.into();
        let row = target.row_type(self)?;
        let input = target.input_type(self)?;
        let ctx = Context::new(self.clone());
        let record = Expr::from(Node::record(ctx.clone(), row));
        Ok(Create {
            ctx,
            target,
            record,
            input,
            only: false,
            payload: PayloadSlot::default(),
            trailer: Trailer::default(),
        })
    }
}

impl Create {
    payload_methods!(set);
    payload_methods!(content);
    trailer_methods!(only);
}

impl Statement for Create {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn kind(&self) -> &'static str {
        "CREATE"
    }

    fn render_statement(&self, d: &mut DisplayContext) -> String {
        let mut out = String::from("CREATE ");
        if self.only {
            out.push_str("ONLY ");
        }
        out.push_str(&self.target.render(d));
        self.payload.render(d, &mut out);
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
