//! JSON:API Atomic Operations: parsing the request document and executing
//! its operations in order.

pub mod lid;
pub mod operations;
pub mod parsers;
pub mod processor;
pub mod results;
pub mod values;

pub use lid::LidMap;
pub use operations::{
    Create, Delete, ListOfOperations, Operation, Update, UpdateToMany, UpdateToOne,
};
pub use parsers::{operation_parser, operations_parser, ListOfOperationsParser, OperationParser};
pub use processor::Processor;
pub use results::{ListOfResults, Processed, ATOMIC_RESULTS};
pub use values::{Href, OpCode, ParsedHref, Ref, Target};
