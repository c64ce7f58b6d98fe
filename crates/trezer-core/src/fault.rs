//! The structured fault model.
//!
//! A [`Fault`] is the error value every Trezer component produces. It carries:
//!
//! - a machine-readable `code`, unique within the originating component
//! - the architectural [`Layer`] it was raised in
//! - the name of the originating component
//! - a human-readable message
//! - a [`Metadata`] mapping of structured values
//! - an optional cause, forming a singly-linked chain down to the root error
//!
//! Faults are built through layer-specific factories returning a [`FaultBuilder`].
//! Calling [`FaultBuilder::build`] emits a `warn` record and freezes the fault.
//! Wrapping a fault at a higher layer emits another record, so a failure that
//! crosses three layers is logged three times.
//!
//! # Example
//!
//! ```
//! use trezer_core::{Fault, Layer};
//!
//! let sql = Fault::sql("SQL_COMMIT_ERROR", "Commit raised an error").build();
//! let repo = Fault::repository("PetRepository", "INSERT_ERROR", "Error while inserting Pet")
//!     .cause(sql)
//!     .build();
//!
//! assert_eq!(repo.layer(), Layer::Adapter);
//! assert_eq!(repo.to_string(), "RepositoryFault [INSERT_ERROR] : Error while inserting Pet");
//! assert_eq!(repo.cause_fault().map(Fault::code), Some("SQL_COMMIT_ERROR"));
//! ```

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Structured values attached to a fault.
pub type Metadata = BTreeMap<String, Value>;

/// Result type alias using [`Fault`].
pub type FaultResult<T> = Result<T, Fault>;

/// Shared, type-erased cause of a fault.
type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Metadata key whose value is logged as `object_id`.
const ID_KEY: &str = "id";

/// Metadata key holding an elapsed time in milliseconds.
const DURATION_KEY: &str = "duration";

/// Architectural layer a fault originated in.
///
/// Purely classificatory: no control flow depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    /// Unclassified.
    Other,
    /// Pipeline and transport plumbing.
    Framework,
    /// Stores and repositories.
    Adapter,
    /// Business rules.
    UseCase,
    /// Input validation and boundary response shaping.
    Command,
}

impl Layer {
    /// Returns the display name of this layer.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Other => "Other",
            Self::Framework => "Frameworks",
            Self::Adapter => "Adapters",
            Self::UseCase => "UseCases",
            Self::Command => "Commands",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The factory family a fault was built by.
///
/// The kind fixes the [`Layer`] and the `<Kind>` prefix of the rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// Generic fault outside any layer.
    Other,
    /// Pipeline or host plumbing.
    Framework,
    /// Repository adapter.
    Repository,
    /// Business use case.
    UseCase,
    /// SQL store.
    Sql,
    /// Request decoding and validation.
    Validator,
    /// Boundary fault carrying a transport status.
    Transport,
}

impl FaultKind {
    /// Returns the layer faults of this kind belong to.
    #[must_use]
    pub const fn layer(self) -> Layer {
        match self {
            Self::Other => Layer::Other,
            Self::Framework => Layer::Framework,
            Self::Repository | Self::Sql => Layer::Adapter,
            Self::UseCase => Layer::UseCase,
            Self::Validator | Self::Transport => Layer::Command,
        }
    }

    /// Returns the type name used when rendering the fault.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Other => "Fault",
            Self::Framework => "FrameworkFault",
            Self::Repository => "RepositoryFault",
            Self::UseCase => "UseCaseFault",
            Self::Sql => "SqlFault",
            Self::Validator => "ValidatorFault",
            Self::Transport => "APIGatewayProxyFault",
        }
    }

    const fn default_component(self) -> &'static str {
        match self {
            Self::Sql => "Sql",
            Self::Validator => "Validator",
            Self::Transport => "APIGatewayProxy",
            Self::Other | Self::Framework | Self::Repository | Self::UseCase => "",
        }
    }
}

/// A structured, loggable error value.
///
/// Immutable once built. Cloning is cheap: the cause is shared.
#[derive(Debug, Clone)]
pub struct Fault {
    kind: FaultKind,
    code: String,
    component: String,
    message: String,
    metadata: Metadata,
    status: Option<StatusCode>,
    cause: Option<Cause>,
}

impl Fault {
    /// Starts building a fault of the given kind.
    pub fn builder(
        kind: FaultKind,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> FaultBuilder {
        FaultBuilder {
            kind,
            code: code.into(),
            component: kind.default_component().to_string(),
            message: message.into(),
            metadata: Metadata::new(),
            status: None,
            cause: None,
        }
    }

    /// Framework-layer fault raised by pipeline or host plumbing.
    pub fn framework(
        component: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> FaultBuilder {
        Self::builder(FaultKind::Framework, code, message).component(component)
    }

    /// Adapter-layer fault raised by a repository.
    pub fn repository(
        component: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> FaultBuilder {
        Self::builder(FaultKind::Repository, code, message).component(component)
    }

    /// Use-case-layer fault raised by a business rule.
    pub fn use_case(
        component: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> FaultBuilder {
        Self::builder(FaultKind::UseCase, code, message).component(component)
    }

    /// Adapter-layer fault raised by the SQL store.
    ///
    /// A `duration` metadata entry (milliseconds) is logged and appended to the
    /// log message as a formatted elapsed time.
    pub fn sql(code: impl Into<String>, message: impl Into<String>) -> FaultBuilder {
        Self::builder(FaultKind::Sql, code, message)
    }

    /// Command-layer fault raised while decoding or validating input.
    pub fn validator(code: impl Into<String>, message: impl Into<String>) -> FaultBuilder {
        Self::builder(FaultKind::Validator, code, message)
    }

    /// Boundary fault with an explicit transport status.
    pub fn transport(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> FaultBuilder {
        Self::builder(FaultKind::Transport, code, message).status(status)
    }

    /// Re-keys an existing fault with an explicit transport status.
    ///
    /// Code, message and metadata are copied; the original becomes the cause.
    #[must_use]
    pub fn transport_from(status: StatusCode, cause: Fault) -> Fault {
        Self::builder(FaultKind::Transport, cause.code.clone(), cause.message.clone())
            .status(status)
            .metadata(cause.metadata.clone())
            .cause(cause)
            .build()
    }

    /// Re-keys an existing fault, deriving the status from its code.
    ///
    /// See [`crate::status::status_for_code`] for the lookup.
    #[must_use]
    pub fn transport_classified(cause: Fault) -> Fault {
        let status = crate::status::status_for_code(&cause.code);
        Self::transport_from(status, cause)
    }

    /// The machine-readable code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The layer this fault was raised in.
    #[must_use]
    pub const fn layer(&self) -> Layer {
        self.kind.layer()
    }

    /// The factory family this fault was built by.
    #[must_use]
    pub const fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Name of the originating component.
    #[doc(alias = "middleware")]
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The transport status, set only on transport faults.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The wrapped cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// The wrapped cause when it is itself a fault.
    #[must_use]
    pub fn cause_fault(&self) -> Option<&Fault> {
        self.cause()?.downcast_ref::<Fault>()
    }

    /// Iterates this fault followed by every error in its cause chain.
    pub fn chain(&self) -> impl Iterator<Item = &(dyn StdError + 'static)> {
        std::iter::successors(Some(self as &(dyn StdError + 'static)), |&err| err.source())
    }

    /// The deepest error of the cause chain, `self` when there is no cause.
    #[must_use]
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        self.chain().last().unwrap_or(self)
    }

    /// Returns true if this fault or any fault in its chain has the given code.
    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.chain()
            .filter_map(|err| err.downcast_ref::<Fault>())
            .any(|fault| fault.code == code)
    }

    fn object_id(&self) -> Option<String> {
        match self.metadata.get(ID_KEY)? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    fn duration_ms(&self) -> Option<u64> {
        self.metadata.get(DURATION_KEY)?.as_u64()
    }

    fn emit(&self) {
        let cause = self.cause.as_ref().map(ToString::to_string);
        let object_id = self.object_id();
        let duration = if self.kind == FaultKind::Sql {
            self.duration_ms()
        } else {
            None
        };

        match duration {
            Some(ms) => tracing::warn!(
                code = %self.code,
                layer = %self.layer(),
                component = %self.component,
                cause = cause.as_deref(),
                object_id = object_id.as_deref(),
                duration = ms,
                error = %self,
                "{} ({})",
                self.message,
                format_elapsed(Duration::from_millis(ms))
            ),
            None => tracing::warn!(
                code = %self.code,
                layer = %self.layer(),
                component = %self.component,
                cause = cause.as_deref(),
                object_id = object_id.as_deref(),
                error = %self,
                "{}",
                self.message
            ),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] : {}",
            self.kind.type_name(),
            self.code,
            self.message
        )
    }
}

impl StdError for Fault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Builder for [`Fault`].
///
/// Nothing is logged until [`build`](Self::build) is called.
#[must_use]
#[derive(Debug)]
pub struct FaultBuilder {
    kind: FaultKind,
    code: String,
    component: String,
    message: String,
    metadata: Metadata,
    status: Option<StatusCode>,
    cause: Option<Cause>,
}

impl FaultBuilder {
    /// Sets the originating component name.
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    /// Replaces the metadata mapping.
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Adds a single metadata entry.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Records an elapsed time as a `duration` entry in milliseconds.
    pub fn duration(self, elapsed: Duration) -> Self {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.meta(DURATION_KEY, ms)
    }

    /// Sets the transport status.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Chains an underlying error as the cause.
    pub fn cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Chains an underlying error when one is present.
    pub fn maybe_cause<E>(self, cause: Option<E>) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        match cause {
            Some(cause) => self.cause(cause),
            None => self,
        }
    }

    /// Freezes the fault and logs it at `warn`.
    #[must_use]
    pub fn build(self) -> Fault {
        let fault = Fault {
            kind: self.kind,
            code: self.code,
            component: self.component,
            message: self.message,
            metadata: self.metadata,
            status: self.status,
            cause: self.cause,
        };
        fault.emit();
        fault
    }
}

/// Formats an elapsed time the way log messages print it (`12ms`, `1.5s`).
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{elapsed:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_layer_display() {
        assert_eq!(Layer::Other.to_string(), "Other");
        assert_eq!(Layer::Framework.to_string(), "Frameworks");
        assert_eq!(Layer::Adapter.to_string(), "Adapters");
        assert_eq!(Layer::UseCase.to_string(), "UseCases");
        assert_eq!(Layer::Command.to_string(), "Commands");
    }

    #[test]
    fn test_kind_fixes_layer() {
        assert_eq!(Fault::sql("X", "x").build().layer(), Layer::Adapter);
        assert_eq!(Fault::repository("R", "X", "x").build().layer(), Layer::Adapter);
        assert_eq!(Fault::use_case("U", "X", "x").build().layer(), Layer::UseCase);
        assert_eq!(Fault::validator("X", "x").build().layer(), Layer::Command);
        assert_eq!(
            Fault::transport(StatusCode::NOT_FOUND, "X", "x").build().layer(),
            Layer::Command
        );
        assert_eq!(Fault::framework("F", "X", "x").build().layer(), Layer::Framework);
        assert_eq!(
            Fault::builder(FaultKind::Other, "X", "x").build().layer(),
            Layer::Other
        );
    }

    #[test]
    fn test_display_rendering() {
        let fault = Fault::use_case("PetUseCase", "PET_NOT_FOUND", "Pet not found").build();
        assert_eq!(fault.to_string(), "UseCaseFault [PET_NOT_FOUND] : Pet not found");

        let fault = Fault::sql("SQL_COMMIT_ERROR", "Commit raised an error").build();
        assert_eq!(fault.to_string(), "SqlFault [SQL_COMMIT_ERROR] : Commit raised an error");

        let fault = Fault::transport(StatusCode::BAD_REQUEST, "BAD_REQUEST", "Provide ID").build();
        assert_eq!(fault.to_string(), "APIGatewayProxyFault [BAD_REQUEST] : Provide ID");
    }

    #[test]
    fn test_default_components() {
        assert_eq!(Fault::sql("X", "x").build().component(), "Sql");
        assert_eq!(Fault::validator("X", "x").build().component(), "Validator");
        assert_eq!(
            Fault::transport(StatusCode::OK, "X", "x").build().component(),
            "APIGatewayProxy"
        );
        assert_eq!(
            Fault::repository("PetRepository", "X", "x").build().component(),
            "PetRepository"
        );
    }

    #[test]
    fn test_metadata_entries() {
        let fault = Fault::repository("PetRepository", "NOT_FOUND", "Pet not found")
            .meta("id", "0190a6b8-7c1e-7000-8000-000000000000")
            .duration(Duration::from_millis(42))
            .build();

        assert_eq!(
            fault.metadata().get("id"),
            Some(&json!("0190a6b8-7c1e-7000-8000-000000000000"))
        );
        assert_eq!(fault.metadata().get("duration"), Some(&json!(42)));
        assert_eq!(
            fault.object_id().as_deref(),
            Some("0190a6b8-7c1e-7000-8000-000000000000")
        );
    }

    #[test]
    fn test_cause_is_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let fault = Fault::sql("SQL_CONNECTION_ERROR", "Cannot connect to the database")
            .cause(io)
            .build();

        let source = fault.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("socket closed"));
        assert!(fault.cause_fault().is_none());
        assert_eq!(fault.root_cause().to_string(), "socket closed");
    }

    #[test]
    fn test_transport_from_copies_fields() {
        let inner = Fault::use_case("PetUseCase", "PET_NOT_FOUND", "Pet not found")
            .meta("id", "abc")
            .build();
        let outer = Fault::transport_from(StatusCode::NOT_FOUND, inner);

        assert_eq!(outer.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(outer.code(), "PET_NOT_FOUND");
        assert_eq!(outer.message(), "Pet not found");
        assert_eq!(outer.metadata().get("id"), Some(&json!("abc")));
        assert_eq!(outer.kind(), FaultKind::Transport);
        assert_eq!(outer.cause_fault().map(Fault::layer), Some(Layer::UseCase));
    }

    #[test]
    fn test_transport_classified() {
        let inner = Fault::validator("MALFORMED_JSON", "bad json").build();
        assert_eq!(
            Fault::transport_classified(inner).status(),
            Some(StatusCode::BAD_REQUEST)
        );

        let inner = Fault::use_case("PetUseCase", "PET_CREATION_FAILED", "failed").build();
        assert_eq!(
            Fault::transport_classified(inner).status(),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }

    #[test]
    fn test_has_code_walks_chain() {
        let root = Fault::sql("UNIQUE_VIOLATION", "Error while executing SQL").build();
        let repo = Fault::repository("PetRepository", "UNIQUE_VIOLATION", "Pet id not unique")
            .cause(root)
            .build();
        let use_case = Fault::use_case("PetUseCase", "PET_ID_NOT_UNIQUE", "Pet id not unique")
            .cause(repo)
            .build();

        assert!(use_case.has_code("PET_ID_NOT_UNIQUE"));
        assert!(use_case.has_code("UNIQUE_VIOLATION"));
        assert!(!use_case.has_code("NOT_FOUND"));
        assert_eq!(use_case.chain().count(), 3);
    }

    mod records {
        use parking_lot::Mutex;
        use std::collections::BTreeMap;
        use std::fmt;
        use std::sync::Arc;
        use tracing::field::{Field, Visit};
        use tracing::{Event, Level, Subscriber};
        use tracing_subscriber::layer::Context;

        pub struct Record {
            pub level: Level,
            pub fields: BTreeMap<String, String>,
        }

        #[derive(Default)]
        struct Fields(BTreeMap<String, String>);

        impl Visit for Fields {
            fn record_str(&mut self, field: &Field, value: &str) {
                self.0.insert(field.name().to_string(), value.to_string());
            }

            fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
                self.0.insert(field.name().to_string(), format!("{value:?}"));
            }
        }

        /// Keeps every event emitted while installed.
        #[derive(Clone, Default)]
        pub struct Capture(Arc<Mutex<Vec<Record>>>);

        impl Capture {
            pub fn take(&self) -> Vec<Record> {
                std::mem::take(&mut *self.0.lock())
            }
        }

        impl<S: Subscriber> tracing_subscriber::Layer<S> for Capture {
            fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
                let mut fields = Fields::default();
                event.record(&mut fields);
                self.0.lock().push(Record {
                    level: *event.metadata().level(),
                    fields: fields.0,
                });
            }
        }
    }

    fn captured(build: impl FnOnce()) -> Vec<records::Record> {
        use tracing_subscriber::layer::SubscriberExt;

        let capture = records::Capture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        tracing::subscriber::with_default(subscriber, build);
        capture.take()
    }

    #[test]
    fn test_each_wrap_logs_one_warn_record() {
        let records = captured(|| {
            let sql = Fault::sql("SQL_ERROR", "Error while executing SQL")
                .meta("id", "abc")
                .duration(Duration::from_millis(1500))
                .build();
            let repo = Fault::repository("PetRepository", "INSERT_ERROR", "Error while inserting Pet")
                .cause(sql)
                .build();
            let _ = Fault::transport_from(StatusCode::INTERNAL_SERVER_ERROR, repo);
        });

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|record| record.level == tracing::Level::WARN));

        let sql = &records[0].fields;
        assert_eq!(sql["code"], "SQL_ERROR");
        assert_eq!(sql["layer"], "Adapters");
        assert_eq!(sql["component"], "Sql");
        assert_eq!(sql["object_id"], "abc");
        assert_eq!(sql["duration"], "1500");
        assert_eq!(sql["message"], "Error while executing SQL (1.5s)");
        assert!(!sql.contains_key("cause"));

        let repo = &records[1].fields;
        assert_eq!(repo["code"], "INSERT_ERROR");
        assert_eq!(repo["component"], "PetRepository");
        assert_eq!(repo["cause"], "SqlFault [SQL_ERROR] : Error while executing SQL");
        assert!(!repo.contains_key("duration"));
        assert!(!repo.contains_key("object_id"));

        let transport = &records[2].fields;
        assert_eq!(transport["code"], "INSERT_ERROR");
        assert_eq!(transport["layer"], "Commands");
        assert_eq!(transport["component"], "APIGatewayProxy");
        assert_eq!(
            transport["error"],
            "APIGatewayProxyFault [INSERT_ERROR] : Error while inserting Pet"
        );
    }

    #[test]
    fn test_duration_is_only_logged_for_sql_faults() {
        let records = captured(|| {
            let _ = Fault::use_case("PetUseCase", "SLOW", "Slow use case")
                .duration(Duration::from_millis(20))
                .meta("id", 7)
                .build();
        });

        assert_eq!(records.len(), 1);
        let fields = &records[0].fields;
        assert_eq!(fields["message"], "Slow use case");
        assert_eq!(fields["object_id"], "7");
        assert!(!fields.contains_key("duration"));
    }

    #[test]
    fn test_builder_is_silent_until_built() {
        let records = captured(|| {
            let _ = Fault::sql("SQL_ERROR", "never built").meta("id", "x");
        });
        assert!(records.is_empty());
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(12)), "12ms");
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.5s");
    }

    proptest! {
        #[test]
        fn prop_root_cause_survives_any_wrap_depth(depth in 0usize..32) {
            let io = std::io::Error::new(std::io::ErrorKind::Other, "root");
            let mut fault = Fault::sql("SQL_ERROR", "level 0").cause(io).build();
            for level in 0..depth {
                let builder = if level % 2 == 0 {
                    Fault::repository("Repo", format!("L{level}"), "wrapped")
                } else {
                    Fault::use_case("UseCase", format!("L{level}"), "wrapped")
                };
                fault = builder.cause(fault).build();
            }

            prop_assert_eq!(fault.chain().count(), depth + 2);
            prop_assert_eq!(fault.root_cause().to_string(), "root");
            prop_assert!(fault.has_code("SQL_ERROR"));
        }
    }
}
