//! The single-connection protocol engine.
//!
//! The engine is sans-I/O. On the receive side the transport copies
//! bytes into [`Engine::write_region`], reports them with
//! [`Engine::advance`], and calls [`Engine::drain`], which dispatches
//! whole frames into the state machine; it never suspends mid-frame.
//! On the send side [`Engine::start_up`], [`Engine::build_execute`] and
//! [`Engine::build_terminate`] assemble complete outbound payloads, and
//! [`Engine::take_outgoing`] surfaces messages produced while draining
//! (authentication responses, COPY traffic).
//!
//! One execute cycle runs from `build_execute` to the ReadyForQuery
//! that ends it, at which point [`Engine::take_result`] yields the
//! batched results or the captured error.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::cache::{CacheKey, Lookup, Statement, StatementCache};
use crate::error::{Error, Result, ServerError};
use crate::framer::Framer;
use crate::param::Param;
use crate::protocol::backend::{
    self, AuthenticationMessage, BackendKeyData, CommandComplete, CopyInResponse, CopyOutResponse,
    DataRow, EmptyQueryResponse, NotificationResponse, ParameterDescription, ParameterStatus,
    ParseComplete, PortalSuspended, ReadyForQuery, RowDescription, msg_type,
};
use crate::protocol::backend::extended::{BindComplete, CloseComplete, NoData};
use crate::protocol::backend::{parse_error_fields, parse_notice_fields};
use crate::protocol::frontend::auth::{ScramClient, md5_password};
use crate::protocol::frontend::{
    write_close_statement, write_copy_data, write_copy_done, write_copy_fail, write_execute,
    write_parse, write_password, write_query, write_sasl_initial_response, write_sasl_response,
    write_startup, write_sync, write_terminate,
};
use crate::protocol::frontend::extended::{write_bind, write_describe_portal};
use crate::protocol::frontend::startup::write_cancel_request;
use crate::protocol::types::{FormatCode, Oid, ResultFormat, TransactionStatus};
use crate::session::SessionState;
use crate::types::{self as registry, DecodeFn};
use crate::value::{Field, ResultSet, Row, Value};

/// Default statement cache size.
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Default number of executions before a statement is server-prepared.
pub const DEFAULT_PREPARE_THRESHOLD: u32 = 5;

/// SQLSTATE of "cached plan must not change result type".
const FEATURE_NOT_SUPPORTED: &str = "0A000";

/// Engine connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// No connection.
    #[default]
    Closed,
    /// Startup sent, running the authentication exchange.
    Connecting,
    /// Authenticated, collecting session parameters and the backend key.
    Authenticating,
    /// Idle between cycles; executes are accepted.
    ReadyForQuery,
    /// An execute cycle is in flight; no new execute is accepted.
    Executing,
    /// Terminate was sent.
    Terminating,
}

/// Message surfaced outside the request/response cycle.
#[derive(Debug, Clone)]
pub enum AsyncMessage {
    /// Server notice or warning.
    Notice(ServerError),
    /// LISTEN/NOTIFY notification.
    Notification {
        /// Notifying backend PID.
        pid: u32,
        /// Channel name.
        channel: String,
        /// Notification payload.
        payload: String,
    },
    /// A server parameter changed mid-session.
    ParameterChanged {
        /// Parameter name.
        name: String,
        /// New value.
        value: String,
    },
}

/// Outcome of one execute cycle, delivered at ReadyForQuery.
#[derive(Debug)]
pub struct ExecResult {
    /// The batched results, or the first captured error.
    pub outcome: Result<Vec<ResultSet>>,
    /// True when the error came from a stale cached plan outside a
    /// transaction; a single transparent retry is expected to succeed.
    pub retryable: bool,
    /// Transaction status reported by the final ReadyForQuery.
    pub transaction_status: TransactionStatus,
}

// Per-cycle accumulators, created by build_execute and consumed at
// ReadyForQuery.
struct ExecState {
    key: Option<CacheKey>,
    named_parse: bool,
    parse_acked: bool,
    cached: bool,
    raw: bool,
    // result format requested for this cycle's columns
    column_format: FormatCode,
    copy_data: Option<Vec<u8>>,
    fields: Arc<[Field]>,
    decoders: Arc<[DecodeFn]>,
    have_fields: bool,
    // registry-picked fields and decoders kept for cache attachment
    described: Option<(Arc<[Field]>, Arc<[DecodeFn]>)>,
    rows: Vec<Row>,
    results: Vec<ResultSet>,
    error: Option<Error>,
    retryable: bool,
    wipe_cache: bool,
}

impl ExecState {
    fn new(
        key: Option<CacheKey>,
        raw: bool,
        column_format: FormatCode,
        copy_data: Option<Vec<u8>>,
    ) -> Self {
        Self {
            key,
            named_parse: false,
            parse_acked: false,
            cached: false,
            raw,
            column_format,
            copy_data,
            fields: empty_fields(),
            decoders: Arc::from(Vec::new()),
            have_fields: false,
            described: None,
            rows: Vec::new(),
            results: Vec::new(),
            error: None,
            retryable: false,
            wipe_cache: false,
        }
    }

    fn finish_statement(&mut self, tag: String) {
        let fields = std::mem::replace(&mut self.fields, empty_fields());
        self.results.push(ResultSet {
            fields,
            rows: std::mem::take(&mut self.rows),
            tag,
        });
        self.decoders = Arc::from(Vec::new());
        self.have_fields = false;
    }
}

fn empty_fields() -> Arc<[Field]> {
    Arc::from(Vec::new())
}

fn derive_decoders(fields: &[Field], raw: bool, format: FormatCode) -> Arc<[DecodeFn]> {
    fields
        .iter()
        .map(|f| {
            if raw {
                registry::RAW.decoder(format)
            } else {
                registry::lookup(f.type_oid).decoder(format)
            }
        })
        .collect::<Vec<_>>()
        .into()
}

/// The protocol engine for one connection.
pub struct Engine {
    framer: Framer,
    core: Core,
}

struct Core {
    status: Status,
    session: SessionState,
    cache: StatementCache,
    stmt_to_close: Option<Statement>,
    backend_key: Option<BackendKeyData>,
    transaction_status: TransactionStatus,
    user: String,
    password: Option<String>,
    scram: Option<ScramClient>,
    outgoing: Vec<u8>,
    async_messages: VecDeque<AsyncMessage>,
    exec: Option<ExecState>,
    result: Option<ExecResult>,
}

impl Engine {
    /// Create an engine with the default cache configuration.
    pub fn new() -> Self {
        Self::with_cache(DEFAULT_CACHE_SIZE, DEFAULT_PREPARE_THRESHOLD)
    }

    /// Create an engine with an explicit cache size and prepare
    /// threshold. A threshold of zero disables statement caching.
    pub fn with_cache(cache_size: usize, prepare_threshold: u32) -> Self {
        Self {
            framer: Framer::new(),
            core: Core {
                status: Status::Closed,
                session: SessionState::new(),
                cache: StatementCache::new(cache_size, prepare_threshold),
                stmt_to_close: None,
                backend_key: None,
                transaction_status: TransactionStatus::Idle,
                user: String::new(),
                password: None,
                scram: None,
                outgoing: Vec::new(),
                async_messages: VecDeque::new(),
                exec: None,
                result: None,
            },
        }
    }

    /// Current connection status.
    pub fn status(&self) -> Status {
        self.core.status
    }

    /// Tracked session parameters.
    pub fn session(&self) -> &SessionState {
        &self.core.session
    }

    /// Transaction status from the last ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.core.transaction_status
    }

    /// The backend key captured at startup, for out-of-band cancels.
    pub fn backend_key(&self) -> Option<(u32, u32)> {
        self.core
            .backend_key
            .map(|key| (key.process_id(), key.secret()))
    }

    /// Build the startup message and enter the connecting state.
    ///
    /// `parameters` must contain at least `user`; the facade adds
    /// `database`, `application_name` and friends. `client_encoding`
    /// is forced to UTF8.
    pub fn start_up(
        &mut self,
        parameters: &[(&str, &str)],
        password: Option<&str>,
    ) -> Result<Vec<u8>> {
        if self.core.status != Status::Closed {
            return Err(Error::Protocol(format!(
                "cannot start up in state {:?}",
                self.core.status
            )));
        }
        let user = parameters
            .iter()
            .find(|(name, _)| *name == "user")
            .map(|(_, value)| value.to_string())
            .ok_or_else(|| Error::InvalidUsage("startup parameters must include user".into()))?;

        let mut params: Vec<(&str, &str)> = Vec::with_capacity(parameters.len() + 1);
        params.extend(
            parameters
                .iter()
                .filter(|(name, _)| *name != "client_encoding")
                .copied(),
        );
        params.push(("client_encoding", "UTF8"));

        let mut buf = Vec::new();
        write_startup(&mut buf, &params);

        self.core.user = user;
        self.core.password = password.map(|p| p.to_string());
        self.core.status = Status::Connecting;
        tracing::debug!(user = %self.core.user, "starting up");
        Ok(buf)
    }

    /// A writable region of at least `min` bytes for the transport.
    pub fn write_region(&mut self, min: usize) -> &mut [u8] {
        self.framer.write_region(min)
    }

    /// Record `n` bytes received into the last write region.
    pub fn advance(&mut self, n: usize) {
        self.framer.advance(n);
    }

    /// Process every complete buffered frame.
    ///
    /// Errors returned here are fatal (broken framing, configuration,
    /// startup failures). Errors inside an execute cycle are captured
    /// and reported through [`Engine::take_result`] once ReadyForQuery
    /// arrives, matching how server errors behave.
    pub fn drain(&mut self) -> Result<()> {
        loop {
            match self.framer.next_frame() {
                Ok(Some((kind, payload))) => {
                    if let Err(err) = self.core.handle_message(kind, payload) {
                        self.core.status = Status::Closed;
                        return Err(err);
                    }
                }
                Ok(None) => return Ok(()),
                Err(err) => {
                    self.core.status = Status::Closed;
                    return Err(err);
                }
            }
        }
    }

    /// Bytes produced while draining (auth responses, COPY traffic)
    /// that the transport must send now.
    pub fn take_outgoing(&mut self) -> Option<Vec<u8>> {
        if self.core.outgoing.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.core.outgoing))
        }
    }

    /// Next queued asynchronous message, if any.
    pub fn take_async_message(&mut self) -> Option<AsyncMessage> {
        self.core.async_messages.pop_front()
    }

    /// The finished execute cycle's outcome, once ReadyForQuery arrived.
    pub fn take_result(&mut self) -> Option<ExecResult> {
        self.core.result.take()
    }

    /// Assemble the complete message sequence for one execution.
    ///
    /// With zero parameters, no binary result request and no cached
    /// statement this is a Simple Query; anything else selects the
    /// Extended Query flow. A pending statement close is piggy-backed
    /// in front. The returned payload must be sent as-is, in order.
    pub fn build_execute(
        &mut self,
        sql: &str,
        params: &[Param],
        result_format: ResultFormat,
        raw: bool,
        copy_data: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        self.core.build_execute(sql, params, result_format, raw, copy_data)
    }

    /// Build the Terminate message and enter the terminating state.
    pub fn build_terminate(&mut self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_terminate(&mut buf);
        self.core.status = Status::Terminating;
        buf
    }

    /// Build a CancelRequest payload for a separate connection.
    pub fn build_cancel(&self) -> Option<Vec<u8>> {
        self.core.backend_key.map(|key| {
            let mut buf = Vec::new();
            write_cancel_request(&mut buf, key.process_id(), key.secret());
            buf
        })
    }

    /// Record a transport failure: the engine closes and any in-flight
    /// execute fails.
    pub fn connection_lost(&mut self) {
        self.core.status = Status::Closed;
        if let Some(exec) = self.core.exec.take() {
            self.core.result = Some(ExecResult {
                outcome: Err(Error::Io(std::io::ErrorKind::ConnectionAborted.into())),
                retryable: false,
                transaction_status: self.core.transaction_status,
            });
            drop(exec);
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Core {
    fn handle_message(&mut self, kind: u8, payload: &[u8]) -> Result<()> {
        if backend::is_async_type(kind) {
            return self.handle_async(kind, payload);
        }

        match self.status {
            Status::Connecting => self.on_connecting(kind, payload),
            Status::Authenticating => self.on_authenticating(kind, payload),
            Status::Executing => match self.on_executing(kind, payload) {
                Ok(()) => Ok(()),
                Err(err @ (Error::Config(_) | Error::Io(_))) => Err(err),
                Err(err) => {
                    // captured; keep consuming until ReadyForQuery
                    if let Some(exec) = &mut self.exec {
                        if exec.error.is_none() {
                            exec.error = Some(err);
                        }
                        Ok(())
                    } else {
                        Err(err)
                    }
                }
            },
            Status::ReadyForQuery => Err(Error::Protocol(format!(
                "message {:?} while idle",
                kind as char
            ))),
            Status::Closed | Status::Terminating => Err(Error::Protocol(format!(
                "message {:?} in state {:?}",
                kind as char, self.status
            ))),
        }
    }

    fn handle_async(&mut self, kind: u8, payload: &[u8]) -> Result<()> {
        match kind {
            msg_type::PARAMETER_STATUS => {
                let param = ParameterStatus::parse(payload)?;
                self.session.set_parameter(param.name, param.value)?;
                if matches!(self.status, Status::ReadyForQuery | Status::Executing) {
                    self.async_messages.push_back(AsyncMessage::ParameterChanged {
                        name: param.name.to_string(),
                        value: param.value.to_string(),
                    });
                }
            }
            msg_type::NOTICE_RESPONSE => {
                let notice = parse_notice_fields(payload)?;
                self.async_messages.push_back(AsyncMessage::Notice(notice));
            }
            msg_type::NOTIFICATION_RESPONSE => {
                let n = NotificationResponse::parse(payload)?;
                self.async_messages.push_back(AsyncMessage::Notification {
                    pid: n.pid,
                    channel: n.channel.to_string(),
                    payload: n.payload.to_string(),
                });
            }
            _ => unreachable!("not an async message kind"),
        }
        Ok(())
    }

    fn require_password(&self) -> Result<String> {
        self.password
            .clone()
            .ok_or_else(|| Error::Auth("password required but not provided".into()))
    }

    fn on_connecting(&mut self, kind: u8, payload: &[u8]) -> Result<()> {
        match kind {
            msg_type::AUTHENTICATION => match AuthenticationMessage::parse(payload)? {
                AuthenticationMessage::Ok => {
                    self.scram = None;
                    self.status = Status::Authenticating;
                    Ok(())
                }
                AuthenticationMessage::CleartextPassword => {
                    let password = self.require_password()?;
                    write_password(&mut self.outgoing, &password);
                    Ok(())
                }
                AuthenticationMessage::Md5Password { salt } => {
                    let password = self.require_password()?;
                    let hashed = md5_password(&self.user, &password, &salt);
                    write_password(&mut self.outgoing, &hashed);
                    Ok(())
                }
                AuthenticationMessage::Sasl { mechanisms } => {
                    if !mechanisms.contains(&"SCRAM-SHA-256") {
                        return Err(Error::Auth(format!(
                            "no supported SASL mechanism, server offers {mechanisms:?}"
                        )));
                    }
                    let password = self.require_password()?;
                    let scram = ScramClient::new(&password);
                    write_sasl_initial_response(
                        &mut self.outgoing,
                        "SCRAM-SHA-256",
                        scram.client_first_message().as_bytes(),
                    );
                    self.scram = Some(scram);
                    Ok(())
                }
                AuthenticationMessage::SaslContinue { data } => {
                    let scram = self
                        .scram
                        .as_mut()
                        .ok_or_else(|| Error::Protocol("SASLContinue without SASL exchange".into()))?;
                    let server_first = simdutf8::compat::from_utf8(data)
                        .map_err(|e| Error::Auth(format!("invalid server-first-message: {e}")))?;
                    let client_final =
                        scram.process_server_first(server_first).map_err(Error::Auth)?;
                    write_sasl_response(&mut self.outgoing, client_final.as_bytes());
                    Ok(())
                }
                AuthenticationMessage::SaslFinal { data } => {
                    let scram = self
                        .scram
                        .as_ref()
                        .ok_or_else(|| Error::Protocol("SASLFinal without SASL exchange".into()))?;
                    let server_final = simdutf8::compat::from_utf8(data)
                        .map_err(|e| Error::Auth(format!("invalid server-final-message: {e}")))?;
                    scram.verify_server_final(server_final).map_err(Error::Auth)?;
                    Ok(())
                }
                AuthenticationMessage::Other(code) => Err(Error::Unsupported(format!(
                    "authentication method {code}"
                ))),
            },
            msg_type::ERROR_RESPONSE => Err(Error::Server(parse_error_fields(payload)?)),
            _ => Err(Error::Protocol(format!(
                "message {:?} during authentication",
                kind as char
            ))),
        }
    }

    fn on_authenticating(&mut self, kind: u8, payload: &[u8]) -> Result<()> {
        match kind {
            msg_type::BACKEND_KEY_DATA => {
                self.backend_key = Some(BackendKeyData::parse(payload)?);
                Ok(())
            }
            msg_type::READY_FOR_QUERY => {
                let rfq = ReadyForQuery::parse(payload)?;
                self.transaction_status = rfq.transaction_status;
                self.status = Status::ReadyForQuery;
                tracing::debug!("connection ready");
                Ok(())
            }
            msg_type::ERROR_RESPONSE => Err(Error::Server(parse_error_fields(payload)?)),
            _ => Err(Error::Protocol(format!(
                "message {:?} during session startup",
                kind as char
            ))),
        }
    }

    fn on_executing(&mut self, kind: u8, payload: &[u8]) -> Result<()> {
        // After a captured error the server skips to the cycle end;
        // everything but ReadyForQuery is discarded.
        if kind != msg_type::READY_FOR_QUERY
            && self.exec.as_ref().is_some_and(|e| e.error.is_some())
        {
            return Ok(());
        }

        let exec = self
            .exec
            .as_mut()
            .ok_or_else(|| Error::Protocol("no execute cycle in flight".into()))?;

        match kind {
            msg_type::PARSE_COMPLETE => {
                ParseComplete::parse(payload)?;
                if exec.named_parse {
                    exec.parse_acked = true;
                }
                Ok(())
            }
            msg_type::BIND_COMPLETE => {
                BindComplete::parse(payload)?;
                Ok(())
            }
            msg_type::CLOSE_COMPLETE => {
                CloseComplete::parse(payload)?;
                Ok(())
            }
            msg_type::PARAMETER_DESCRIPTION => {
                ParameterDescription::parse(payload)?;
                Ok(())
            }
            msg_type::ROW_DESCRIPTION => {
                let desc = RowDescription::parse(payload)?;
                let fields: Arc<[Field]> = desc.fields.into();
                let picked: Arc<[DecodeFn]> = fields
                    .iter()
                    .map(|f| registry::lookup(f.type_oid).decoder(f.format))
                    .collect::<Vec<_>>()
                    .into();
                exec.decoders = if exec.raw {
                    fields
                        .iter()
                        .map(|f| registry::RAW.decoder(f.format))
                        .collect::<Vec<_>>()
                        .into()
                } else {
                    picked.clone()
                };
                if exec.named_parse {
                    exec.described = Some((fields.clone(), picked));
                }
                exec.fields = fields;
                exec.have_fields = true;
                Ok(())
            }
            msg_type::NO_DATA => {
                NoData::parse(payload)?;
                Ok(())
            }
            msg_type::DATA_ROW => {
                if !exec.have_fields {
                    return Err(Error::Protocol("DataRow before RowDescription".into()));
                }
                let row = DataRow::parse(payload)?;
                if row.len() != exec.decoders.len() {
                    return Err(Error::Framing(format!(
                        "DataRow has {} columns, RowDescription {}",
                        row.len(),
                        exec.decoders.len()
                    )));
                }
                let mut values = Vec::with_capacity(row.len());
                for (decode, column) in exec.decoders.iter().zip(row.iter()) {
                    match column? {
                        None => values.push(Value::Null),
                        Some(bytes) => values.push(decode(&self.session, bytes)?),
                    }
                }
                exec.rows.push(values);
                Ok(())
            }
            msg_type::COMMAND_COMPLETE => {
                let complete = CommandComplete::parse(payload)?;
                if complete.wipes_statements() {
                    exec.wipe_cache = true;
                }
                exec.finish_statement(complete.tag.to_string());
                Ok(())
            }
            msg_type::EMPTY_QUERY_RESPONSE => {
                EmptyQueryResponse::parse(payload)?;
                exec.finish_statement(String::new());
                Ok(())
            }
            msg_type::PORTAL_SUSPENDED => {
                PortalSuspended::parse(payload)?;
                exec.finish_statement(String::new());
                Ok(())
            }
            msg_type::COPY_IN_RESPONSE => {
                CopyInResponse::parse(payload)?;
                match exec.copy_data.take() {
                    Some(data) => {
                        write_copy_data(&mut self.outgoing, &data);
                        write_copy_done(&mut self.outgoing);
                    }
                    None => {
                        write_copy_fail(&mut self.outgoing, "no COPY source data provided");
                    }
                }
                Ok(())
            }
            msg_type::COPY_OUT_RESPONSE => {
                CopyOutResponse::parse(payload)?;
                Ok(())
            }
            msg_type::COPY_DATA => {
                exec.rows.push(vec![Value::Bytes(payload.to_vec())]);
                Ok(())
            }
            msg_type::COPY_DONE => Ok(()),
            msg_type::ERROR_RESPONSE => {
                let fields = parse_error_fields(payload)?;
                if exec.error.is_none() {
                    exec.retryable =
                        exec.cached && fields.code.as_deref() == Some(FEATURE_NOT_SUPPORTED);
                    tracing::debug!(code = %fields.sqlstate(), "server error captured");
                    exec.error = Some(Error::Server(fields));
                }
                Ok(())
            }
            msg_type::READY_FOR_QUERY => self.finish_cycle(payload),
            _ => Err(Error::Protocol(format!(
                "unexpected message {:?} during execute",
                kind as char
            ))),
        }
    }

    fn finish_cycle(&mut self, payload: &[u8]) -> Result<()> {
        let rfq = ReadyForQuery::parse(payload)?;
        self.transaction_status = rfq.transaction_status;

        let mut exec = self
            .exec
            .take()
            .ok_or_else(|| Error::Protocol("ReadyForQuery without execute state".into()))?;

        if exec.wipe_cache {
            // DISCARD ALL / DEALLOCATE ALL freed everything server-side
            self.cache.clear();
            self.stmt_to_close = None;
        } else if exec.error.is_none() {
            if let Some(key) = exec.key.take() {
                let (fields, decoders) = match exec.described.take() {
                    Some((fields, decoders)) => (Some(fields), Some(decoders)),
                    None => (None, None),
                };
                let prepared_now = exec.named_parse && exec.parse_acked;
                self.cache
                    .commit_success(&key, prepared_now, fields, decoders, exec.column_format);
            }
        } else if let Some(key) = exec.key.take() {
            if let Some(stmt) = self.cache.commit_failure(&key) {
                tracing::debug!(name = %stmt.name(), "scheduling failed statement close");
                self.stmt_to_close = Some(stmt);
            }
        }

        let retryable = exec.retryable && !rfq.transaction_status.in_transaction();
        let outcome = match exec.error {
            Some(err) => Err(err),
            None => Ok(exec.results),
        };
        self.result = Some(ExecResult {
            outcome,
            retryable,
            transaction_status: rfq.transaction_status,
        });
        self.status = Status::ReadyForQuery;
        Ok(())
    }

    fn build_execute(
        &mut self,
        sql: &str,
        params: &[Param],
        result_format: ResultFormat,
        raw: bool,
        copy_data: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        if self.status != Status::ReadyForQuery {
            return Err(Error::Protocol(format!(
                "cannot execute in state {:?}",
                self.status
            )));
        }

        let encoded: Vec<_> = params.iter().map(Param::encode).collect();
        let param_oids: Vec<Oid> = encoded.iter().map(|p| p.oid).collect();

        let key = self
            .cache
            .enabled()
            .then(|| CacheKey::new(sql, &param_oids));
        let outcome = match &key {
            Some(key) => self.cache.lookup_or_insert(key),
            None => Lookup::Miss { evicted: None },
        };

        let column_format = match result_format {
            ResultFormat::Text => FormatCode::Text,
            ResultFormat::Default | ResultFormat::Binary => FormatCode::Binary,
        };

        let mut buf = Vec::new();
        if let Some(stmt) = self.stmt_to_close.take() {
            write_close_statement(&mut buf, &stmt.name());
        }
        if let Lookup::Miss {
            evicted: Some(stmt),
        } = &outcome
        {
            // evicted prepared statement: close it ahead of anything
            // that could reuse its name
            write_close_statement(&mut buf, &stmt.name());
        }

        let mut exec = ExecState::new(key, raw, column_format, copy_data);

        match outcome {
            Lookup::Prepared {
                name,
                fields,
                decoders,
                result_format,
            } => {
                write_bind(&mut buf, "", &name, &encoded, &[column_format]);
                write_execute(&mut buf, "", 0);
                write_sync(&mut buf);
                exec.cached = true;
                if let Some(fields) = fields {
                    // stored decoders only fit the format they were
                    // described under
                    exec.decoders = match decoders {
                        Some(decoders) if !raw && result_format == column_format => decoders,
                        _ => derive_decoders(&fields, raw, column_format),
                    };
                    exec.fields = fields;
                    exec.have_fields = true;
                }
            }
            Lookup::Prepare { name } => {
                write_parse(&mut buf, &name, sql, &param_oids);
                write_bind(&mut buf, "", &name, &encoded, &[column_format]);
                write_describe_portal(&mut buf, "");
                write_execute(&mut buf, "", 0);
                write_sync(&mut buf);
                exec.named_parse = true;
            }
            Lookup::Hit | Lookup::Miss { .. } => {
                let simple = params.is_empty() && result_format != ResultFormat::Binary;
                if simple {
                    write_query(&mut buf, sql);
                } else {
                    write_parse(&mut buf, "", sql, &param_oids);
                    write_bind(&mut buf, "", "", &encoded, &[column_format]);
                    write_describe_portal(&mut buf, "");
                    write_execute(&mut buf, "", 0);
                    write_sync(&mut buf);
                }
            }
        }

        self.exec = Some(exec);
        self.status = Status::Executing;
        Ok(buf)
    }
}
