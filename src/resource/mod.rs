//! Resource descriptions, custom resources, the copy engine and the reuse pools behind it.

pub(crate) mod copy;
pub(crate) mod custom;
pub(crate) mod desc;
pub(crate) mod pool;
pub(crate) mod target;
