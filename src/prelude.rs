//! Commonly used items for convenient importing.
//!
//! ```
//! use errleaf::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Column(&'static str);
//!
//! let mut ctx = Context::<(Column,)>::new();
//! let id = with_context(&mut ctx, || new_error(Value(Column("email"))));
//! assert_eq!(ctx.get::<Column>(id), Some(&Column("email")));
//! ```

pub use crate::{
    Compute, Context, ErrorContext, ErrorId, Value, accumulate, new_error, with_context,
    with_context_propagating,
};
