pub mod tuner;
