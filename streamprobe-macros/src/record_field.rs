use darling::FromField;
use syn::{DeriveInput, Fields};

/// Parsed attributes from #[record(...)]
#[derive(Debug, FromField)]
#[darling(attributes(record))]
pub struct RecordField {
    pub ident: Option<syn::Ident>,
    pub ty: syn::Type,

    #[darling(default)]
    pub skip: bool,

    #[darling(default)]
    pub rename: Option<String>,
}

impl RecordField {
    pub fn key(&self) -> Option<String> {
        match &self.rename {
            Some(name) => Some(name.clone()),
            None => self.ident.as_ref().map(|ident| ident.to_string()),
        }
    }
}

pub fn parse_fields(input: &DeriveInput) -> darling::Result<Vec<RecordField>> {
    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(darling::Error::custom(
                    "FlatRecord requires a struct with named fields",
                )
                .with_span(&input.ident))
            }
        },
        _ => {
            return Err(
                darling::Error::custom("FlatRecord can only be derived for structs")
                    .with_span(&input.ident),
            )
        }
    };

    let mut errors = darling::Error::accumulator();
    let parsed: Vec<RecordField> = fields
        .iter()
        .filter_map(|f| errors.handle(RecordField::from_field(f)))
        .filter(|f| !f.skip)
        .collect();
    errors.finish()?;

    Ok(parsed)
}
