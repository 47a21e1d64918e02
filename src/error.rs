use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::delete_table::DeleteTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use serde_dynamo::Error as SerdeDynamoError;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use crate::schema::{AttributeType, SchemaValidationError};

type DynamoPutError = SdkError<PutItemError, Response>;
type DynamoGetError = SdkError<GetItemError, Response>;
type DynamoQueryError = SdkError<QueryError, Response>;
type DynamoScanError = SdkError<ScanError, Response>;
type DynamoDeleteItemError = SdkError<DeleteItemError, Response>;
type DynamoCreateTableError = SdkError<CreateTableError, Response>;
type DynamoDescribeTableError = SdkError<DescribeTableError, Response>;
type DynamoDeleteTableError = SdkError<DeleteTableError, Response>;
type DynamoBatchWriteItemError = SdkError<BatchWriteItemError, Response>;

/// Mapping, schema and store error
#[derive(Debug)]
pub enum Error {
    /// Serde DynamoDB serialization/deserialization error
    SerdeDynamo(SerdeDynamoError),
    /// DynamoDB request builder error
    BuildError(BuildError),
    /// DynamoDB PutItem operation error
    DynamoPutError(DynamoPutError),
    /// DynamoDB GetItem operation error
    DynamoGetError(DynamoGetError),
    /// DynamoDB Query operation error
    DynamoQueryError(DynamoQueryError),
    /// DynamoDB Scan operation error
    DynamoScanError(DynamoScanError),
    /// DynamoDB DeleteItem operation error
    DynamoDeleteItemError(DynamoDeleteItemError),
    /// DynamoDB CreateTable operation error
    DynamoCreateTableError(DynamoCreateTableError),
    /// DynamoDB DescribeTable operation error
    DynamoDescribeTableError(DynamoDescribeTableError),
    /// DynamoDB DeleteTable operation error
    DynamoDeleteTableError(DynamoDeleteTableError),
    /// DynamoDB BatchWriteItem operation error
    DynamoBatchWriteItemError(DynamoBatchWriteItemError),
    /// Failure reported by a store that is not backed by the AWS SDK
    Store(String),

    /// The field's declared type has no mapping strategy
    UnsupportedFieldType {
        /// Owning record type
        record: &'static str,
        /// Field name
        field: &'static str,
        /// Declared type, as described by the field descriptor
        declared: String,
    },
    /// One-to-many relationships cannot be mapped
    UnsupportedRelationship {
        /// Owning record type
        record: &'static str,
        /// Field name
        field: &'static str,
    },
    /// A field tagged as embedded points at a type that is not embeddable
    NotEmbeddable {
        /// Owning record type
        record: &'static str,
        /// Field name
        field: &'static str,
        /// Type found behind the field
        declared: &'static str,
    },
    /// No single-attribute index is declared for the queried attribute
    NoIndexFound {
        /// Table name
        table: &'static str,
        /// Queried attribute
        attribute: String,
    },
    /// An index declaration that cannot be turned into a secondary index
    InvalidIndex {
        /// Table name
        table: &'static str,
        /// Index name
        index: String,
        /// What is wrong with it
        reason: String,
    },
    /// The entity type declares no id field
    MissingIdField {
        /// Entity type
        record: &'static str,
    },
    /// A reference points at an entity type without a registered repository
    RepositoryNotRegistered {
        /// Referenced entity type
        record: &'static str,
    },

    /// The entity has no id and no generator produced one
    MissingIdentifier {
        /// Entity type
        record: &'static str,
    },
    /// A stored item was read without its primary key
    MissingPrimaryKey {
        /// Entity type
        record: &'static str,
    },
    /// A stored value does not match the type the field expects
    IncompatibleAttributeType {
        /// Attribute name
        attribute: String,
        /// Expected attribute type
        expected: AttributeType,
        /// Description of what was found
        found: String,
    },
    /// A stored value uses a DynamoDB type the mapper cannot read
    UnsupportedAttributeValue {
        /// Attribute name
        attribute: String,
    },
    /// Validation of an existing table failed
    InvalidSchema {
        /// Table name
        table: &'static str,
        /// Validation errors found
        errors: Vec<SchemaValidationError>,
    },

    /// The table does not exist
    TableNotFound {
        /// Table name
        table: String,
    },
    /// The table did not reach the awaited state in time
    TableWaitTimeout {
        /// Table name
        table: String,
        /// Awaited state
        state: &'static str,
        /// Time spent waiting
        waited: Duration,
    },

    /// A batch operation did not finish within its budget
    BatchTimeout {
        /// Table name
        table: &'static str,
        /// Total budget
        timeout: Duration,
        /// Tasks finished before the budget ran out
        completed: usize,
        /// Tasks submitted
        total: usize,
    },
    /// Unprocessed items remained after the configured retries
    UnprocessedItems {
        /// Table name
        table: &'static str,
        /// Items still unprocessed
        remaining: usize,
        /// Retries made
        retries: usize,
    },
}

impl Error {
    /// Check if the error is a mapping configuration error
    ///
    /// Configuration errors come from entity declarations and never succeed on retry.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFieldType { .. }
                | Error::UnsupportedRelationship { .. }
                | Error::NotEmbeddable { .. }
                | Error::NoIndexFound { .. }
                | Error::InvalidIndex { .. }
                | Error::MissingIdField { .. }
                | Error::RepositoryNotRegistered { .. }
        )
    }

    /// Check if the error is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Error::MissingIdentifier { .. }
                | Error::MissingPrimaryKey { .. }
                | Error::IncompatibleAttributeType { .. }
                | Error::UnsupportedAttributeValue { .. }
                | Error::InvalidSchema { .. }
        )
    }

    /// Check if the error is a batch timeout
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::BatchTimeout { .. } | Error::TableWaitTimeout { .. }
        )
    }

    /// Check if the error is a serialization/deserialization error
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, Error::SerdeDynamo(_))
    }

    /// Check if the error was raised by the DynamoDB SDK
    pub fn is_dynamodb_error(&self) -> bool {
        matches!(
            self,
            Error::BuildError(_)
                | Error::DynamoPutError(_)
                | Error::DynamoGetError(_)
                | Error::DynamoQueryError(_)
                | Error::DynamoScanError(_)
                | Error::DynamoDeleteItemError(_)
                | Error::DynamoCreateTableError(_)
                | Error::DynamoDescribeTableError(_)
                | Error::DynamoDeleteTableError(_)
                | Error::DynamoBatchWriteItemError(_)
        )
    }
}

macro_rules! impl_from_error {
    ($name:ident, $variant:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$variant(e)
            }
        }
    };
    ($name:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$name(e)
            }
        }
    };
}

impl_from_error!(SerdeDynamoError, SerdeDynamo);
impl_from_error!(BuildError);
impl_from_error!(DynamoPutError);
impl_from_error!(DynamoGetError);
impl_from_error!(DynamoQueryError);
impl_from_error!(DynamoScanError);
impl_from_error!(DynamoDeleteItemError);
impl_from_error!(DynamoCreateTableError);
impl_from_error!(DynamoDescribeTableError);
impl_from_error!(DynamoDeleteTableError);
impl_from_error!(DynamoBatchWriteItemError);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerdeDynamo(e) => write!(f, "DynamoDB serialization error: {}", e),
            Error::BuildError(e) => write!(f, "DynamoDB request builder error: {}", e),
            Error::DynamoPutError(e) => write!(f, "DynamoDB PutItem operation failed: {}", e),
            Error::DynamoGetError(e) => write!(f, "DynamoDB GetItem operation failed: {}", e),
            Error::DynamoQueryError(e) => write!(f, "DynamoDB Query operation failed: {}", e),
            Error::DynamoScanError(e) => write!(f, "DynamoDB Scan operation failed: {}", e),
            Error::DynamoDeleteItemError(e) => {
                write!(f, "DynamoDB DeleteItem operation failed: {}", e)
            }
            Error::DynamoCreateTableError(e) => {
                write!(f, "DynamoDB CreateTable operation failed: {}", e)
            }
            Error::DynamoDescribeTableError(e) => {
                write!(f, "DynamoDB DescribeTable operation failed: {}", e)
            }
            Error::DynamoDeleteTableError(e) => {
                write!(f, "DynamoDB DeleteTable operation failed: {}", e)
            }
            Error::DynamoBatchWriteItemError(e) => {
                write!(f, "DynamoDB BatchWriteItem operation failed: {}", e)
            }
            Error::Store(message) => write!(f, "Store operation failed: {}", message),
            Error::UnsupportedFieldType {
                record,
                field,
                declared,
            } => write!(
                f,
                "Field {}.{} has unsupported type {}",
                record, field, declared
            ),
            Error::UnsupportedRelationship { record, field } => write!(
                f,
                "One to many relationship on {}.{} is not supported",
                record, field
            ),
            Error::NotEmbeddable {
                record,
                field,
                declared,
            } => write!(
                f,
                "Field {}.{} is embedded but {} is not embeddable",
                record, field, declared
            ),
            Error::NoIndexFound { table, attribute } => write!(
                f,
                "No index found for attribute {} on table {}",
                attribute, table
            ),
            Error::InvalidIndex {
                table,
                index,
                reason,
            } => write!(f, "Invalid index {} on table {}: {}", index, table, reason),
            Error::MissingIdField { record } => write!(f, "No id field declared on {}", record),
            Error::RepositoryNotRegistered { record } => {
                write!(f, "No repository registered for {}", record)
            }
            Error::MissingIdentifier { record } => write!(
                f,
                "Entity {} has no id and no id generator is configured",
                record
            ),
            Error::MissingPrimaryKey { record } => {
                write!(f, "Primary key not found in item for {}", record)
            }
            Error::IncompatibleAttributeType {
                attribute,
                expected,
                found,
            } => write!(
                f,
                "Attribute {} holds {}, expected {}",
                attribute, found, expected
            ),
            Error::UnsupportedAttributeValue { attribute } => {
                write!(f, "Attribute {} has an unsupported value type", attribute)
            }
            Error::InvalidSchema { table, errors } => {
                write!(f, "Table {} has an invalid schema", table)?;
                for error in errors {
                    write!(f, "; {}", error)?;
                }
                Ok(())
            }
            Error::TableNotFound { table } => write!(f, "Table {} not found", table),
            Error::TableWaitTimeout {
                table,
                state,
                waited,
            } => write!(
                f,
                "Table {} did not become {} after {:?}",
                table, state, waited
            ),
            Error::BatchTimeout {
                table,
                timeout,
                completed,
                total,
            } => write!(
                f,
                "Batch on table {} timed out after {:?} with {}/{} tasks completed",
                table, timeout, completed, total
            ),
            Error::UnprocessedItems {
                table,
                remaining,
                retries,
            } => write!(
                f,
                "{} items on table {} still unprocessed after {} retries",
                remaining, table, retries
            ),
        }
    }
}

impl StdError for Error {}
