pub mod business;
pub mod openai;
pub mod upstream;
