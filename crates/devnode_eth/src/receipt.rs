//! Transaction receipts, in their execution, transaction and block forms.

mod block;
pub mod execution;
mod transaction;

pub use self::{
    block::BlockReceipt,
    execution::Execution,
    transaction::TransactionReceipt,
};
