//! Commands of the Assert Runner CLI.

pub mod run;
