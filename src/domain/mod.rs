mod ledger;
mod money;
mod record;
mod statement;

pub use ledger::*;
pub use money::*;
pub use record::*;
pub use statement::*;
