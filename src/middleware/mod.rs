//! Channel adapters that wrap the flow executor.

pub mod choice_mapper;
pub mod pagination;
pub mod session;

pub use choice_mapper::{CHOICE_MAPPING_KEY, ChoiceMapper};
pub use pagination::{PAGINATION_KEY, PageOffset, Paginator, PaginationMiddleware, PaginationState};
pub use session::SessionMiddleware;
