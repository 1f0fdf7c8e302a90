// src/models/mod.rs

// 1. Объявляем модули
pub mod configuration;
pub mod occurrence;
pub mod result;
pub mod template;

// 2. Ре-экспортируем содержимое, чтобы структуры были доступны как crate::models::StructName
pub use configuration::*;
pub use occurrence::*;
pub use result::*;
pub use template::*;
