// blockgen — Block Generator
//
// Library root. One module per compiler phase, leaves first.

pub mod canon;
pub mod diag;
pub mod idlist;
pub mod signal_type;

pub mod catalog;
pub mod codec;
pub mod dbc_lexer;
pub mod dbc_parser;

pub mod behavior;
pub mod emit;
pub mod interface;
pub mod model;
pub mod schema;
pub mod sim;

pub mod pass;
pub mod pipeline;
