pub(crate) mod completions;
pub(crate) mod exec;
pub(crate) mod send;
pub(crate) mod serve;
