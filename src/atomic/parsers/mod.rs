pub mod data;
pub mod href;
pub mod list;
pub mod operation;
pub mod reference;
pub mod target;

pub use href::HrefParser;
pub use list::{ListOfOperationsParser, ATOMIC_OPERATIONS};
pub use operation::{
    CreateParser, DeleteParser, OperationParser, ParsesOperation, UpdateParser,
    UpdateToManyParser, UpdateToOneParser,
};
pub use reference::RefParser;
pub use target::HrefOrRefParser;

use crate::server::Server;

/// The parser for a single operation object, resolving hrefs against `server`.
pub fn operation_parser(server: &dyn Server) -> OperationParser<'_> {
    OperationParser::new(HrefOrRefParser::new(HrefParser::new(server), RefParser::new()))
}

/// Wire up the full parser stack for `server`.
pub fn operations_parser(server: &dyn Server) -> ListOfOperationsParser<'_> {
    ListOfOperationsParser::new(operation_parser(server))
}
