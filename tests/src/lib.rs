#![cfg(test)]
mod partition;
mod probe;
mod util;
