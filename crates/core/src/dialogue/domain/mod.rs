pub mod dialogue_oracle;
pub mod prompt_builder;
