pub mod check;
pub mod declare;
pub mod run;
