//! Minting of fresh codes from a sequence counter.
//!
//! Each `generate` call takes the next seed for the bound scope, encodes it and
//! reserves the code in the issued ledger. A reservation that collides with an
//! already-issued number (normally one imported by an operator) burns that seed
//! and tries the next one, up to `max_attempts` seeds per call.

use std::sync::Arc;
use std::time::Instant;

use crate::codec::CodeEncoder;
use crate::config::GeneratorConfig;
use crate::conflict::StructuredConflictInterpreter;
use crate::contracts::{
    ConstraintViolationInterpreter, Environment, GeneratorError, IssuedNumberLedger,
    IssuedNumberRecord, ProductId, Scope, SequenceCounterStore, Table, TenantId, UseCase,
};
use crate::metrics::GeneratorMetrics;
use crate::storage::{RocksDbIssuedLedger, RocksDbSequenceCounter, RocksDbStore};

/// Hands out never-before-issued codes for one scope.
///
/// Starts unbound; [`set_properties`](Self::set_properties) binds it, after
/// which `generate` may be called any number of times. Sharing one bound
/// instance between threads is fine, rebinding needs `&mut self`.
pub struct ReferenceNumberGenerator {
    counters: Arc<dyn SequenceCounterStore>,
    ledger: Arc<dyn IssuedNumberLedger>,
    interpreter: Arc<dyn ConstraintViolationInterpreter>,
    encoder: CodeEncoder,
    config: GeneratorConfig,
    use_case: UseCase,
    scope: Option<Scope>,
    metrics: Arc<GeneratorMetrics>,
}

impl ReferenceNumberGenerator {
    pub fn new(
        counters: Arc<dyn SequenceCounterStore>,
        ledger: Arc<dyn IssuedNumberLedger>,
        mut config: GeneratorConfig,
    ) -> Self {
        // Every call draws at least one seed.
        config.max_attempts = config.max_attempts.max(1);
        Self {
            counters,
            ledger,
            interpreter: Arc::new(StructuredConflictInterpreter),
            encoder: CodeEncoder::new(),
            config,
            use_case: UseCase::QuoteNumber,
            scope: None,
            metrics: Arc::new(GeneratorMetrics::default()),
        }
    }

    /// Generator over the RocksDB counters and ledger, reporting into the store's metrics.
    pub fn for_store(store: &Arc<RocksDbStore>, config: GeneratorConfig) -> Self {
        let metrics = Arc::clone(&store.metrics().generator);
        Self::new(
            Arc::new(RocksDbSequenceCounter::new(Arc::clone(store))),
            Arc::new(RocksDbIssuedLedger::new(Arc::clone(store))),
            config,
        )
        .with_metrics(metrics)
    }

    pub fn with_interpreter(mut self, interpreter: Arc<dyn ConstraintViolationInterpreter>) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_use_case(mut self, use_case: UseCase) -> Self {
        self.use_case = use_case;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<GeneratorMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Binds the generator to `(tenant, product, environment)`.
    pub fn set_properties(&mut self, tenant: TenantId, product: ProductId, environment: Environment) {
        self.scope = Some(Scope::new(tenant, product, environment));
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    fn bound_scope(&self) -> Result<&Scope, GeneratorError> {
        self.scope.as_ref().ok_or(GeneratorError::Unbound)
    }

    /// Mints and reserves a fresh code for the bound scope.
    pub fn generate(&self) -> Result<String, GeneratorError> {
        let scope = self.bound_scope()?;
        let start = Instant::now();
        let mut conflicting_value = None;

        for attempt in 1..=self.config.max_attempts {
            let seed = self.counters.next(scope, self.use_case)?;
            let code = self.encoder.encode(seed)?;
            let record = IssuedNumberRecord {
                number: code,
                seed: Some(seed),
            };

            let err = match self.ledger.reserve(scope, self.use_case, &record) {
                Ok(()) => {
                    self.metrics.record_generated();
                    self.metrics.generate_latency_us.observe_since(start);
                    tracing::debug!(
                        tenant = %scope.tenant,
                        product = %scope.product,
                        environment = %scope.environment,
                        seed,
                        code = %record.number,
                        "Generated reference number"
                    );
                    return Ok(record.number);
                }
                Err(err) => err,
            };

            let conflict = self.interpreter.interpret(
                scope,
                Table::IssuedNumbers,
                Some(self.use_case.as_str()),
                &err,
            );
            if !conflict.succeeded {
                return Err(err.into());
            }

            self.metrics.record_collision();
            tracing::warn!(
                tenant = %scope.tenant,
                product = %scope.product,
                environment = %scope.environment,
                attempt,
                seed,
                conflicting_value = ?conflict.conflicting_value,
                "Generated code already issued, trying next seed"
            );
            conflicting_value = conflict.conflicting_value;
        }

        self.metrics.record_failure();
        tracing::error!(
            tenant = %scope.tenant,
            product = %scope.product,
            environment = %scope.environment,
            attempts = self.config.max_attempts,
            conflicting_value = ?conflicting_value,
            "Sequence generation failed"
        );
        Err(GeneratorError::SequenceGenerationFailed {
            attempts: self.config.max_attempts,
            conflicting_value,
        })
    }

    /// Records `code` as issued for the bound scope without drawing a seed.
    ///
    /// Used for numbers handed out by other means; a later `generate` that
    /// lands on the same code skips it. Codes in the generator's alphabet are
    /// stored uppercase, as `generate` would produce them.
    pub fn import_issued(&self, code: &str) -> Result<(), GeneratorError> {
        let scope = self.bound_scope()?;
        let number = if self.encoder.decode(code).is_ok() {
            code.to_ascii_uppercase()
        } else {
            code.to_string()
        };
        let record = IssuedNumberRecord { number, seed: None };
        self.ledger.reserve(scope, self.use_case, &record)?;
        tracing::info!(
            tenant = %scope.tenant,
            product = %scope.product,
            environment = %scope.environment,
            code = %record.number,
            "Imported issued reference number"
        );
        Ok(())
    }

    /// Looks up an issued code for the bound scope.
    pub fn issued(&self, code: &str) -> Result<Option<IssuedNumberRecord>, GeneratorError> {
        let scope = self.bound_scope()?;
        Ok(self.ledger.get(scope, self.use_case, code)?)
    }
}
