//! Core types for Fakeshion.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod order;
pub mod payment;
pub mod product;
pub mod status;

pub use id::*;
pub use order::{
    InvalidOrder, MAX_LINE_QUANTITY, NewOrder, Order, OrderItem, PaymentInfo, SelectedVariant, ShippingInfo,
    StockAdjustment,
};
pub use payment::PaymentTransaction;
pub use product::{
    NewProduct, NewVariant, Product, ProductUpdate, Rating, RatingError, Review, ReviewChange,
    ReviewDraft, Variant, average_rating,
};
pub use status::*;
