//! BSON value model: the tagged union stored in documents, index keys, and
//! sort keys, plus its canonical on-disk (de)serialization.

pub mod de;
pub mod decimal;
pub mod document;
pub mod guid;
pub mod object_id;
pub mod ser;
pub mod value;

pub use de::from_slice;
pub use decimal::Decimal128;
pub use document::BsonDocument;
pub use guid::Guid;
pub use object_id::ObjectId;
pub use ser::to_vec;
pub use value::{BsonType, BsonValue};
