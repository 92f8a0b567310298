pub mod cidr;
pub mod proxy;
pub mod range;
