use proc_macro::TokenStream;
use quote::quote;
use std::collections::HashSet;
use syn::{
    Expr, ExprLit, Field, Fields, ItemStruct, Lit, Meta, Path, Token, parse_macro_input,
    parse_quote, parse_str, punctuated::Punctuated,
};

/// Column names every versioned table carries, in the order they are injected.
const VERSION_COLUMNS: [&str; 6] = [
    "entity_id",
    "version",
    "previous_version",
    "active",
    "changed_by_id",
    "changed_on",
];

#[derive(Clone, Copy, PartialEq, Eq)]
enum TableKind {
    /// One row per entity, keyed by `entity_id`.
    Current,
    /// One row per produced version, keyed by `(entity_id, version)`.
    History,
}

struct VersionedEntityConfig {
    traits_path: Path,
    kind: TableKind,
}

impl Default for VersionedEntityConfig {
    fn default() -> Self {
        Self {
            traits_path: parse_str("crate::db::dao::versioned_traits")
                .expect("default traits path should parse"),
            kind: TableKind::Current,
        }
    }
}

/// Injects the version-chain columns into a sea-orm model and implements
/// `VersionedModel` / `VersionedEntity` for it.
///
/// ```ignore
/// #[versioned_entity]
/// #[sea_orm::model]
/// #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
/// #[sea_orm(table_name = "todo")]
/// pub struct Model { pub title: String }
///
/// #[versioned_entity(kind = "history")]
/// // ... same model for the `todo_audit` table
/// ```
#[proc_macro_attribute]
pub fn versioned_entity(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr with Punctuated<Meta, Token![,]>::parse_terminated);
    let mut config = VersionedEntityConfig::default();
    if let Err(err) = apply_args(&mut config, args) {
        return err.to_compile_error().into();
    }

    let mut input = parse_macro_input!(item as ItemStruct);
    let fields = match &mut input.fields {
        Fields::Named(fields) => fields,
        _ => {
            return syn::Error::new_spanned(
                input,
                "versioned_entity requires a struct with named fields",
            )
            .to_compile_error()
            .into();
        }
    };

    let existing: HashSet<String> = fields
        .named
        .iter()
        .filter_map(|field| field.ident.as_ref().map(|ident| ident.to_string()))
        .collect();

    if let Some(clash) = VERSION_COLUMNS
        .iter()
        .find(|column| existing.contains(**column))
    {
        return syn::Error::new_spanned(
            &input.ident,
            format!("`{clash}` is managed by versioned_entity and must not be declared"),
        )
        .to_compile_error()
        .into();
    }

    let mut new_fields = Punctuated::new();
    for field in version_fields(config.kind) {
        new_fields.push(field);
    }
    for field in fields.named.iter().cloned() {
        new_fields.push(field);
    }
    fields.named = new_fields;

    let traits_path = config.traits_path;

    let expanded = quote! {
        #input

        impl #traits_path::VersionedModel for Model {
            fn entity_id(&self) -> uuid::Uuid {
                self.entity_id
            }

            fn version(&self) -> uuid::Uuid {
                self.version
            }

            fn previous_version(&self) -> Option<uuid::Uuid> {
                self.previous_version
            }

            fn is_active(&self) -> bool {
                self.active
            }

            fn changed_by_id(&self) -> uuid::Uuid {
                self.changed_by_id
            }

            fn changed_on(&self) -> sea_orm::entity::prelude::DateTimeWithTimeZone {
                self.changed_on
            }

            fn stamp(&mut self, stamp: #traits_path::VersionStamp) {
                self.version = stamp.version;
                self.previous_version = stamp.previous_version;
                self.changed_by_id = stamp.changed_by_id;
                self.changed_on = stamp.changed_on;
            }

            fn deactivate(&mut self) {
                self.active = false;
            }
        }

        impl #traits_path::VersionedEntity for Entity {
            fn entity_id_column() -> Column {
                Column::EntityId
            }

            fn version_column() -> Column {
                Column::Version
            }

            fn active_column() -> Column {
                Column::Active
            }
        }
    };

    expanded.into()
}

fn version_fields(kind: TableKind) -> Vec<Field> {
    let entity_id: Field = parse_quote! {
        #[sea_orm(primary_key, auto_increment = false)]
        pub entity_id: uuid::Uuid
    };
    let version: Field = match kind {
        TableKind::Current => parse_quote! {
            pub version: uuid::Uuid
        },
        TableKind::History => parse_quote! {
            #[sea_orm(primary_key, auto_increment = false)]
            pub version: uuid::Uuid
        },
    };

    vec![
        entity_id,
        version,
        parse_quote! {
            pub previous_version: Option<uuid::Uuid>
        },
        parse_quote! {
            #[sea_orm(default_value = true)]
            pub active: bool
        },
        parse_quote! {
            pub changed_by_id: uuid::Uuid
        },
        parse_quote! {
            pub changed_on: sea_orm::entity::prelude::DateTimeWithTimeZone
        },
    ]
}

fn apply_args(
    config: &mut VersionedEntityConfig,
    args: Punctuated<Meta, Token![,]>,
) -> Result<(), syn::Error> {
    for meta in args {
        let Meta::NameValue(name_value) = meta else {
            return Err(syn::Error::new_spanned(
                meta,
                "expected name-value pair, e.g. kind = \"history\"",
            ));
        };

        let Some(ident) = name_value.path.get_ident() else {
            return Err(syn::Error::new_spanned(
                name_value.path,
                "expected simple identifier for attribute key",
            ));
        };

        let value = match name_value.value {
            Expr::Lit(ExprLit {
                lit: Lit::Str(lit_str),
                ..
            }) => lit_str,
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "expected string literal for attribute value",
                ));
            }
        };

        match ident.to_string().as_str() {
            "traits" => {
                config.traits_path = value.parse::<Path>().map_err(|err| {
                    syn::Error::new(value.span(), format!("invalid traits path: {err}"))
                })?;
            }
            "kind" => {
                config.kind = match value.value().as_str() {
                    "current" => TableKind::Current,
                    "history" => TableKind::History,
                    other => {
                        return Err(syn::Error::new(
                            value.span(),
                            format!("unknown table kind `{other}`, expected current or history"),
                        ));
                    }
                };
            }
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "unknown versioned_entity attribute key",
                ));
            }
        }
    }

    Ok(())
}
