pub mod fixpoint;
