//! Column definitions.

use serde::{Deserialize, Serialize};

/// How a generated column obtains its value on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStrategy {
    /// Auto-increment / serial.
    Increment,
    /// Server-generated UUID.
    Uuid,
}

/// Storage mode of a computed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GeneratedStorage {
    /// Computed on read.
    Virtual,
    /// Computed on write and stored.
    Stored,
}

impl GeneratedStorage {
    /// Returns the SQL keyword.
    #[must_use]
    pub fn to_sql(self) -> &'static str {
        match self {
            Self::Virtual => "VIRTUAL",
            Self::Stored => "STORED",
        }
    }
}

/// A table column.
///
/// `data_type` is the lowercase type name as the server reports it
/// (`integer`, `character varying`, `varchar`, `enum`, ...). The size fields
/// are only rendered when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Lowercase type name.
    pub data_type: String,
    /// Character length, e.g. `varchar(255)`.
    pub length: Option<u32>,
    /// Display width of integer types.
    pub width: Option<u32>,
    /// Numeric precision, or fractional-second precision for time types.
    pub precision: Option<u32>,
    /// Numeric scale.
    pub scale: Option<u32>,
    /// Whether the column accepts NULL.
    pub is_nullable: bool,
    /// Raw SQL default expression.
    pub default: Option<String>,
    /// Raw `ON UPDATE` expression.
    pub on_update: Option<String>,
    /// Whether the column belongs to the primary key.
    pub is_primary: bool,
    /// Whether the column carries a single-column unique constraint.
    pub is_unique: bool,
    /// Whether the server assigns the value.
    pub is_generated: bool,
    /// Strategy for generated columns.
    pub generation_strategy: Option<GenerationStrategy>,
    /// Computed-column expression.
    pub as_expression: Option<String>,
    /// Storage mode for computed columns.
    pub generated_type: Option<GeneratedStorage>,
    /// Allowed values of an enum column.
    pub enum_values: Vec<String>,
    /// Explicit enum type name. Derived from table and column when absent.
    pub enum_name: Option<String>,
    /// Whether the column is an array of `data_type`.
    pub is_array: bool,
    /// Character set.
    pub charset: Option<String>,
    /// Collation.
    pub collation: Option<String>,
    /// Column comment.
    pub comment: Option<String>,
    /// Unsigned numeric.
    pub unsigned: bool,
    /// Zero-filled numeric. Implies unsigned.
    pub zerofill: bool,
    /// Geometry subtype of a spatial column.
    pub spatial_feature_type: Option<String>,
    /// Spatial reference id.
    pub srid: Option<u32>,
}

impl Column {
    /// Creates a nullable column of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into().to_lowercase(),
            length: None,
            width: None,
            precision: None,
            scale: None,
            is_nullable: true,
            default: None,
            on_update: None,
            is_primary: false,
            is_unique: false,
            is_generated: false,
            generation_strategy: None,
            as_expression: None,
            generated_type: None,
            enum_values: Vec::new(),
            enum_name: None,
            is_array: false,
            charset: None,
            collation: None,
            comment: None,
            unsigned: false,
            zerofill: false,
            spatial_feature_type: None,
            srid: None,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self.is_nullable = false; // Primary keys are always NOT NULL
        self
    }

    /// Marks the column as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Makes the column server-generated.
    #[must_use]
    pub fn generated(mut self, strategy: GenerationStrategy) -> Self {
        self.is_generated = true;
        self.generation_strategy = Some(strategy);
        self
    }

    /// Makes the column a computed column.
    #[must_use]
    pub fn computed(mut self, expression: impl Into<String>, storage: GeneratedStorage) -> Self {
        self.as_expression = Some(expression.into());
        self.generated_type = Some(storage);
        self
    }

    /// Sets the raw default expression.
    #[must_use]
    pub fn default(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    /// Sets the raw `ON UPDATE` expression.
    #[must_use]
    pub fn on_update(mut self, expression: impl Into<String>) -> Self {
        self.on_update = Some(expression.into());
        self
    }

    /// Sets the character length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets the integer display width.
    #[must_use]
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets precision and optional scale.
    #[must_use]
    pub fn precision(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    /// Turns the column into an enum with the given values.
    #[must_use]
    pub fn enumeration<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_type = "enum".to_string();
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the column as an array.
    #[must_use]
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// Sets the character set.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Marks the column as unsigned.
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Marks the column as zero-filled (and therefore unsigned).
    #[must_use]
    pub fn zerofill(mut self) -> Self {
        self.zerofill = true;
        self.unsigned = true;
        self
    }

    /// Whether this is the table's auto-increment column.
    #[must_use]
    pub fn is_increment(&self) -> bool {
        self.is_generated && self.generation_strategy == Some(GenerationStrategy::Increment)
    }

    /// Whether values are restricted to `enum_values`.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        matches!(self.data_type.as_str(), "enum" | "simple-enum")
    }

    /// Whether the two definitions differ in a way that cannot be altered in
    /// place without re-creating the column.
    #[must_use]
    pub fn differs_structurally(&self, other: &Self) -> bool {
        self.data_type != other.data_type
            || self.length != other.length
            || self.width != other.width
            || self.is_array != other.is_array
            || self.as_expression != other.as_expression
            || self.generated_type != other.generated_type
            || (self.is_generated
                && other.is_generated
                && self.generation_strategy != other.generation_strategy)
    }

    /// Whether only the length changed, with every other structural attribute
    /// identical.
    #[must_use]
    pub fn is_length_change_only(&self, other: &Self) -> bool {
        self.length != other.length && {
            let mut widened = self.clone();
            widened.length = other.length;
            !widened.differs_structurally(other)
        }
    }
}
