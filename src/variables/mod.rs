pub(crate) mod persist;
pub(crate) mod scope;
pub(crate) mod store;
