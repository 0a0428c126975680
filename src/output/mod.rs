mod response;

pub use response::Outcome;
