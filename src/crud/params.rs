//! Parameters of the CRUD mutations.
//!
//! Every field is optional so hook-time and call-time parameters can each
//! supply part of the set; the merged set must carry the required ones.

use serde_json::Value;

use crate::interfaces::DataProviderError;
use crate::mutation::{MutationError, MutationParams};
use crate::types::Identifier;

macro_rules! mutation_params {
    (
        $(#[$attr:meta])*
        $name:ident {
            required { $($req:ident: $req_ty:ty),* $(,)? }
            optional { $($opt:ident: $opt_ty:ty),* $(,)? }
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            $(pub $req: Option<$req_ty>,)*
            $(pub $opt: Option<$opt_ty>,)*
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            $(
                pub fn $req(mut self, value: impl Into<$req_ty>) -> Self {
                    self.$req = Some(value.into());
                    self
                }
            )*

            $(
                pub fn $opt(mut self, value: impl Into<$opt_ty>) -> Self {
                    self.$opt = Some(value.into());
                    self
                }
            )*
        }

        impl MutationParams for $name {
            fn merge(&self, overrides: &Self) -> Self {
                Self {
                    $($req: overrides.$req.clone().or_else(|| self.$req.clone()),)*
                    $($opt: overrides.$opt.clone().or_else(|| self.$opt.clone()),)*
                }
            }

            fn validate(&self) -> Result<(), MutationError> {
                $(
                    if self.$req.is_none() {
                        return Err(MutationError::MissingParameter(stringify!($req)));
                    }
                )*
                Ok(())
            }
        }
    };
}

mutation_params! {
    /// Parameters of [`update_mutation`](super::update_mutation).
    UpdateMutationParams {
        required { resource: String, id: Identifier, data: Value }
        optional { previous_data: Value, meta: Value }
    }
}

mutation_params! {
    /// Parameters of [`create_mutation`](super::create_mutation).
    CreateMutationParams {
        required { resource: String, data: Value }
        optional { meta: Value }
    }
}

mutation_params! {
    /// Parameters of [`delete_mutation`](super::delete_mutation).
    DeleteMutationParams {
        required { resource: String, id: Identifier }
        optional { previous_data: Value, meta: Value }
    }
}

mutation_params! {
    /// Parameters of [`update_many_mutation`](super::update_many_mutation).
    UpdateManyMutationParams {
        required { resource: String, ids: Vec<Identifier>, data: Value }
        optional { meta: Value }
    }
}

mutation_params! {
    /// Parameters of [`delete_many_mutation`](super::delete_many_mutation).
    DeleteManyMutationParams {
        required { resource: String, ids: Vec<Identifier> }
        optional { meta: Value }
    }
}

/// Unwrap a required field at dispatch time.
///
/// Middlewares may rewrite parameters after validation, so the provider
/// call checks again rather than trusting the earlier pass.
pub(crate) fn required<T>(value: Option<T>, field: &str) -> Result<T, DataProviderError> {
    value.ok_or_else(|| {
        DataProviderError::with_code(
            format!("Mutation requires parameter `{}`", field),
            "missing_parameter",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_time_fields_win() {
        let hook = UpdateMutationParams::new()
            .resource("posts")
            .id(1)
            .data(json!({"title": "hook"}));
        let call = UpdateMutationParams::new().data(json!({"title": "call"}));

        let merged = hook.merge(&call);

        assert_eq!(merged.resource.as_deref(), Some("posts"));
        assert_eq!(merged.id, Some(Identifier::from(1)));
        assert_eq!(merged.data, Some(json!({"title": "call"})));
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let params = DeleteManyMutationParams::new().ids(vec![Identifier::from(1)]);
        assert_eq!(
            params.validate(),
            Err(MutationError::MissingParameter("resource"))
        );

        let params = UpdateMutationParams::new().resource("posts").data(json!({}));
        assert_eq!(params.validate(), Err(MutationError::MissingParameter("id")));
    }

    #[test]
    fn test_required_reports_field() {
        let error = required::<String>(None, "resource").unwrap_err();
        assert_eq!(error.code().as_deref(), Some("missing_parameter"));
        assert!(error.to_string().contains("resource"));
    }
}
