//! Data models for Libris

pub mod book;
pub mod loan;
pub mod pagination;
pub mod reading_list;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookShort};
pub use loan::{Loan, LoanDetails, LoanPolicy};
pub use pagination::Page;
pub use reading_list::{ReadingListDetails, ReadingListEntry};
pub use user::{User, UserShort};
