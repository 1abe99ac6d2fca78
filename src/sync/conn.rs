//! Synchronous PostgreSQL connection.

use std::io::{Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::engine::{AsyncMessage, Engine, ExecResult, Status};
use crate::error::{Error, Result};
use crate::opts::{Opts, SslMode};
use crate::param::Param;
use crate::protocol::frontend::write_ssl_request;
use crate::protocol::types::{ResultFormat, TransactionStatus};
use crate::value::ResultSet;

enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    fn connect(opts: &Opts) -> Result<Self> {
        #[cfg(unix)]
        if let Some(path) = &opts.socket {
            return Ok(Stream::Unix(UnixStream::connect(path)?));
        }
        let stream = TcpStream::connect((opts.host.as_str(), opts.port))?;
        stream.set_nodelay(true)?;
        Ok(Stream::Tcp(stream))
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Stream::Tcp(s) => {
                s.write_all(buf)?;
                s.flush()
            }
            #[cfg(unix)]
            Stream::Unix(s) => {
                s.write_all(buf)?;
                s.flush()
            }
        }
    }
}

/// A blocking connection driving the protocol engine.
pub struct Conn {
    stream: Stream,
    engine: Engine,
    opts: Opts,
}

impl Conn {
    /// Connect and authenticate.
    pub fn connect(opts: Opts) -> Result<Self> {
        let mut stream = Stream::connect(&opts)?;

        if opts.ssl_mode != SslMode::Disable {
            negotiate_ssl(&mut stream, &opts)?;
        }

        let mut engine = Engine::with_cache(opts.cache_size, opts.prepare_threshold);
        let startup = engine.start_up(&opts.startup_parameters(), opts.password.as_deref())?;
        stream.write_all(&startup)?;

        let mut conn = Self {
            stream,
            engine,
            opts,
        };
        while conn.engine.status() != Status::ReadyForQuery {
            conn.pump()?;
        }
        Ok(conn)
    }

    /// Connect using a URL string.
    pub fn connect_url(url: &str) -> Result<Self> {
        Self::connect(Opts::try_from(url)?)
    }

    // One read-drain-respond round.
    fn pump(&mut self) -> Result<()> {
        let region = self.engine.write_region(1);
        let n = match self.stream.read(region) {
            Ok(0) => {
                self.engine.connection_lost();
                return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            Ok(n) => n,
            Err(err) => {
                self.engine.connection_lost();
                return Err(err.into());
            }
        };
        self.engine.advance(n);
        let drained = self.engine.drain();
        if let Some(bytes) = self.engine.take_outgoing() {
            self.stream.write_all(&bytes)?;
        }
        drained
    }

    fn run_cycle(&mut self) -> Result<ExecResult> {
        loop {
            self.pump()?;
            if let Some(result) = self.engine.take_result() {
                return Ok(result);
            }
        }
    }

    fn execute_once(
        &mut self,
        sql: &str,
        params: &[Param],
        result_format: ResultFormat,
        raw: bool,
        copy_data: Option<Vec<u8>>,
    ) -> Result<ExecResult> {
        let payload = self
            .engine
            .build_execute(sql, params, result_format, raw, copy_data)?;
        self.stream.write_all(&payload)?;
        self.run_cycle()
    }

    /// Execute with full control over format, raw mode and COPY input.
    ///
    /// A "cached plan must be replanned" failure outside a transaction
    /// is retried once transparently.
    pub fn execute_with(
        &mut self,
        sql: &str,
        params: &[Param],
        result_format: ResultFormat,
        raw: bool,
        copy_data: Option<Vec<u8>>,
    ) -> Result<Vec<ResultSet>> {
        let result =
            self.execute_once(sql, params, result_format, raw, copy_data.clone())?;
        if result.retryable && result.outcome.is_err() {
            tracing::debug!(sql, "retrying after cached-plan invalidation");
            return self
                .execute_once(sql, params, result_format, raw, copy_data)?
                .outcome;
        }
        result.outcome
    }

    /// Execute one statement with parameters.
    pub fn execute(&mut self, sql: &str, params: &[Param]) -> Result<Vec<ResultSet>> {
        self.execute_with(sql, params, ResultFormat::Default, false, None)
    }

    /// Execute a parameterless SQL script.
    pub fn query(&mut self, sql: &str) -> Result<Vec<ResultSet>> {
        self.execute(sql, &[])
    }

    /// Next queued notice/notification/parameter change, if any.
    pub fn take_async_message(&mut self) -> Option<AsyncMessage> {
        self.engine.take_async_message()
    }

    /// Transaction status from the last ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.engine.transaction_status()
    }

    /// Tracked session parameter value.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.engine.session().parameter(name)
    }

    /// Cancel the in-progress query from a separate connection.
    pub fn cancel(&self) -> Result<()> {
        let payload = self
            .engine
            .build_cancel()
            .ok_or_else(|| Error::InvalidUsage("no backend key for cancellation".into()))?;
        let mut stream = Stream::connect(&self.opts)?;
        stream.write_all(&payload)?;
        Ok(())
    }

    /// Send Terminate and close the connection.
    pub fn close(mut self) -> Result<()> {
        let payload = self.engine.build_terminate();
        self.stream.write_all(&payload)?;
        Ok(())
    }
}

fn negotiate_ssl(stream: &mut Stream, opts: &Opts) -> Result<()> {
    let mut request = Vec::new();
    write_ssl_request(&mut request);
    stream.write_all(&request)?;

    let mut response = [0u8; 1];
    let n = stream.read(&mut response)?;
    if n == 0 {
        return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
    }
    match response[0] {
        b'S' => Err(Error::Unsupported(
            "server accepted TLS but no TLS transport is available".into(),
        )),
        b'N' if opts.ssl_mode == SslMode::Require => {
            Err(Error::Auth("SSL required but refused by server".into()))
        }
        b'N' => Ok(()),
        other => Err(Error::Protocol(format!(
            "unexpected SSL response {:?}",
            other as char
        ))),
    }
}
