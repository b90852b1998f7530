pub mod defaults;
pub mod models;
pub mod repo;
pub mod upcoming;

mod memory;
pub use memory::MemoryStore;

pub use defaults::seed_default_categories;
pub use models::{Category, CategoryInput, NewUser, Person, PersonInput, User, UserInfo};
pub use repo::{BirthdayStore, StoreError, StoreResult};
pub use upcoming::{group_by_month, next_occurrence, upcoming, MonthGroup, UpcomingBirthday, UpcomingQuery};
