//! SeaORM entity models

mod article;

pub use article::{
    Entity as ArticleEntity,
    Model as Article,
    ActiveModel as ArticleActiveModel,
    Column as ArticleColumn,
    ArticleStatus,
    FailureKind,
};
