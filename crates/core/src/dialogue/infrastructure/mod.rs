pub mod ollama_oracle;
