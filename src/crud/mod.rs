//! CRUD mutations over the data provider.
//!
//! Each builder binds a [`MutationEngine`](crate::mutation::MutationEngine)
//! to one write verb of the [`DataProvider`](crate::interfaces::DataProvider):
//! the mutation function calls the verb, and the cache hooks keep every
//! cached copy of the affected records in step with it. Options passed in
//! may override any of the three; unset ones get the defaults here.
//!
//! [`queries`] holds the matching read side.

pub mod cache_updates;
mod create;
mod delete;
mod delete_many;
mod params;
pub mod queries;
mod update;
mod update_many;

pub use create::create_mutation;
pub use delete::delete_mutation;
pub use delete_many::delete_many_mutation;
pub use params::{
    CreateMutationParams, DeleteManyMutationParams, DeleteMutationParams,
    UpdateManyMutationParams, UpdateMutationParams,
};
pub use update::update_mutation;
pub use update_many::update_many_mutation;
