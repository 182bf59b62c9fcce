//! Domain models.

pub mod attribute;
pub mod price;
pub mod recipe;
pub mod user;

pub use attribute::{Attribute, AttributeKind};
pub use price::{Price, PriceError};
pub use recipe::{NewRecipe, Recipe, RecipeChanges};
pub use user::{NewUser, User, UserChanges, UserWithPassword};
