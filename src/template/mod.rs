pub mod folders;
pub mod lower;
pub mod parse;
pub mod source_map;

pub use folders::TemplateFolders;
pub use lower::{lower, GeneratedSource, ENTRY_POINT, MODEL_PARAM};
pub use parse::{parse, Node, ParseError, ParsedTemplate};
