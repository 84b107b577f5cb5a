pub mod normalize;
pub mod relation;
pub mod run;
