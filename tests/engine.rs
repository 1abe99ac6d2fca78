//! Engine tests against hand-assembled server byte streams.
//!
//! The engine is sans-I/O, so a full conversation is just bytes in,
//! bytes out: feed a fabricated server stream, then check the assembled
//! client messages and the delivered results.

use pagio::{
    AsyncMessage, Engine, Error, Param, ResultFormat, Status, TransactionStatus, Value,
};

fn msg(kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![kind];
    out.extend_from_slice(&((payload.len() + 4) as i32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn feed(engine: &mut Engine, bytes: &[u8]) {
    try_feed(engine, bytes).unwrap();
}

fn try_feed(engine: &mut Engine, mut bytes: &[u8]) -> pagio::Result<()> {
    while !bytes.is_empty() {
        let region = engine.write_region(bytes.len());
        let n = region.len().min(bytes.len());
        region[..n].copy_from_slice(&bytes[..n]);
        engine.advance(n);
        engine.drain()?;
        bytes = &bytes[n..];
    }
    Ok(())
}

fn param_status(name: &str, value: &str) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(name.as_bytes());
    payload.push(0);
    payload.extend_from_slice(value.as_bytes());
    payload.push(0);
    msg(b'S', &payload)
}

fn error_response(code: &str, message: &str) -> Vec<u8> {
    let mut payload = Vec::new();
    for (field, value) in [(b'S', "ERROR"), (b'C', code), (b'M', message)] {
        payload.push(field);
        payload.extend_from_slice(value.as_bytes());
        payload.push(0);
    }
    payload.push(0);
    msg(b'E', &payload)
}

fn row_desc(cols: &[(&str, u32, u16)]) -> Vec<u8> {
    let mut payload = (cols.len() as u16).to_be_bytes().to_vec();
    for (name, type_oid, format) in cols {
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        payload.extend_from_slice(&0_u32.to_be_bytes());
        payload.extend_from_slice(&0_i16.to_be_bytes());
        payload.extend_from_slice(&type_oid.to_be_bytes());
        payload.extend_from_slice(&(-1_i16).to_be_bytes());
        payload.extend_from_slice(&(-1_i32).to_be_bytes());
        payload.extend_from_slice(&format.to_be_bytes());
    }
    msg(b'T', &payload)
}

fn data_row(cols: &[Option<&[u8]>]) -> Vec<u8> {
    let mut payload = (cols.len() as u16).to_be_bytes().to_vec();
    for col in cols {
        match col {
            None => payload.extend_from_slice(&(-1_i32).to_be_bytes()),
            Some(bytes) => {
                payload.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                payload.extend_from_slice(bytes);
            }
        }
    }
    msg(b'D', &payload)
}

fn command_complete(tag: &str) -> Vec<u8> {
    let mut payload = tag.as_bytes().to_vec();
    payload.push(0);
    msg(b'C', &payload)
}

fn ready(status: u8) -> Vec<u8> {
    msg(b'Z', &[status])
}

fn auth_ok_stream() -> Vec<u8> {
    let mut stream = msg(b'R', &0_i32.to_be_bytes());
    stream.extend(param_status("client_encoding", "UTF8"));
    stream.extend(param_status("DateStyle", "ISO, MDY"));
    stream.extend(param_status("TimeZone", "UTC"));
    stream.extend(param_status("server_version", "16.3"));
    let mut key = 4321_u32.to_be_bytes().to_vec();
    key.extend_from_slice(&0xdead_beef_u32.to_be_bytes());
    stream.extend(msg(b'K', &key));
    stream.extend(ready(b'I'));
    stream
}

fn connect(engine: &mut Engine) {
    let startup = engine
        .start_up(&[("user", "tester"), ("database", "app")], Some("hunter2"))
        .unwrap();
    // untagged startup message: inclusive length then protocol 3.0
    assert_eq!(&startup[..4], &(startup.len() as i32).to_be_bytes());
    assert_eq!(&startup[4..8], &196608_i32.to_be_bytes());
    feed(engine, &auth_ok_stream());
    assert_eq!(engine.status(), Status::ReadyForQuery);
}

// Split a client payload back into its message kind bytes.
fn kinds_of(mut payload: &[u8]) -> Vec<u8> {
    let mut kinds = Vec::new();
    while !payload.is_empty() {
        let kind = payload[0];
        let len =
            i32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]) as usize;
        kinds.push(kind);
        payload = &payload[1 + len..];
    }
    kinds
}

// Payload of the first message with the given kind.
fn payload_of(mut buf: &[u8], kind: u8) -> Vec<u8> {
    while !buf.is_empty() {
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        if buf[0] == kind {
            return buf[5..1 + len].to_vec();
        }
        buf = &buf[1 + len..];
    }
    panic!("no {:?} message", kind as char);
}

#[test]
fn simple_query_batch() {
    let mut engine = Engine::new();
    connect(&mut engine);

    let out = engine
        .build_execute("SELECT 1,'a'", &[], ResultFormat::Default, false, None)
        .unwrap();
    assert_eq!(kinds_of(&out), b"Q");
    assert_eq!(engine.status(), Status::Executing);

    let mut stream = row_desc(&[("?column?", 23, 0), ("?column?", 25, 0)]);
    stream.extend(data_row(&[Some(b"1"), Some(b"a")]));
    stream.extend(command_complete("SELECT 1"));
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);

    let result = engine.take_result().unwrap();
    assert_eq!(result.transaction_status, TransactionStatus::Idle);
    let results = result.outcome.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tag, "SELECT 1");
    assert_eq!(results[0].fields.len(), 2);
    assert_eq!(
        results[0].rows,
        vec![vec![Value::Int4(1), Value::Text("a".into())]]
    );
    assert_eq!(engine.status(), Status::ReadyForQuery);
}

#[test]
fn extended_query_with_binary_parameter() {
    let mut engine = Engine::new();
    connect(&mut engine);

    let out = engine
        .build_execute(
            "SELECT $1::int4 + 1",
            &[Param::Int(41)],
            ResultFormat::Default,
            false,
            None,
        )
        .unwrap();
    assert_eq!(kinds_of(&out), b"PBDES");
    // unnamed statement, declared int4, 4-byte big-endian value
    let parse = payload_of(&out, b'P');
    assert_eq!(parse[0], 0);
    assert!(parse.ends_with(&[0, 1, 0, 0, 0, 23]));
    let bind = payload_of(&out, b'B');
    assert!(
        bind.windows(8)
            .any(|w| w == [0, 0, 0, 4, 0, 0, 0, 41])
    );

    let mut stream = msg(b'1', b"");
    stream.extend(msg(b'2', b""));
    stream.extend(row_desc(&[("?column?", 23, 1)]));
    stream.extend(data_row(&[Some(&42_i32.to_be_bytes())]));
    stream.extend(command_complete("SELECT 1"));
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);

    let results = engine.take_result().unwrap().outcome.unwrap();
    assert_eq!(results[0].rows, vec![vec![Value::Int4(42)]]);
}

#[test]
fn binary_result_format_selects_extended_query() {
    let mut engine = Engine::new();
    connect(&mut engine);

    let out = engine
        .build_execute("SELECT 1", &[], ResultFormat::Binary, false, None)
        .unwrap();
    assert_eq!(kinds_of(&out), b"PBDES");
}

#[test]
fn prepare_threshold_progression() {
    let mut engine = Engine::with_cache(2, 1);
    connect(&mut engine);

    let respond = |engine: &mut Engine, with_parse: bool, with_desc: bool| {
        let mut stream = Vec::new();
        if with_parse {
            stream.extend(msg(b'1', b""));
        }
        stream.extend(msg(b'2', b""));
        if with_desc {
            stream.extend(row_desc(&[("v", 23, 1)]));
        }
        stream.extend(data_row(&[Some(&7_i32.to_be_bytes())]));
        stream.extend(command_complete("SELECT 1"));
        stream.extend(ready(b'I'));
        feed(engine, &stream);
        engine.take_result().unwrap().outcome.unwrap()
    };

    // first run: unnamed parse
    let out = engine
        .build_execute("SELECT $1::int4", &[Param::Int(7)], ResultFormat::Default, false, None)
        .unwrap();
    assert_eq!(kinds_of(&out), b"PBDES");
    assert_eq!(payload_of(&out, b'P')[0], 0);
    respond(&mut engine, true, true);

    // second run reaches the threshold: named parse
    let out = engine
        .build_execute("SELECT $1::int4", &[Param::Int(7)], ResultFormat::Default, false, None)
        .unwrap();
    assert_eq!(kinds_of(&out), b"PBDES");
    assert!(payload_of(&out, b'P').starts_with(b"_pagio_001\0"));
    respond(&mut engine, true, true);

    // third run: Bind + Execute + Sync only, rows decode via the
    // decoders attached at describe time
    let out = engine
        .build_execute("SELECT $1::int4", &[Param::Int(7)], ResultFormat::Default, false, None)
        .unwrap();
    assert_eq!(kinds_of(&out), b"BES");
    assert!(payload_of(&out, b'B').starts_with(b"\0_pagio_001\0"));
    let results = respond(&mut engine, false, false);
    assert_eq!(results[0].rows, vec![vec![Value::Int4(7)]]);
    assert_eq!(results[0].fields[0].name, "v");
}

#[test]
fn prepared_statement_redecodes_under_other_result_format() {
    let mut engine = Engine::with_cache(2, 1);
    connect(&mut engine);

    // prepare the statement under text results
    for _ in 0..2 {
        let out = engine
            .build_execute(
                "SELECT $1::int4",
                &[Param::Int(7)],
                ResultFormat::Text,
                false,
                None,
            )
            .unwrap();
        assert_eq!(kinds_of(&out), b"PBDES");
        // one result format code: text
        assert!(payload_of(&out, b'B').ends_with(&[0, 1, 0, 0]));

        let mut stream = msg(b'1', b"");
        stream.extend(msg(b'2', b""));
        stream.extend(row_desc(&[("v", 23, 0)]));
        stream.extend(data_row(&[Some(b"7")]));
        stream.extend(command_complete("SELECT 1"));
        stream.extend(ready(b'I'));
        feed(&mut engine, &stream);
        engine.take_result().unwrap().outcome.unwrap();
    }

    // same key executed under the binary default: the text-described
    // decoders do not fit and fresh binary ones must be picked
    let out = engine
        .build_execute(
            "SELECT $1::int4",
            &[Param::Int(7)],
            ResultFormat::Default,
            false,
            None,
        )
        .unwrap();
    assert_eq!(kinds_of(&out), b"BES");
    assert!(payload_of(&out, b'B').ends_with(&[0, 1, 0, 1]));

    let mut stream = msg(b'2', b"");
    stream.extend(data_row(&[Some(&42_i32.to_be_bytes())]));
    stream.extend(command_complete("SELECT 1"));
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);

    let results = engine.take_result().unwrap().outcome.unwrap();
    assert_eq!(results[0].rows, vec![vec![Value::Int4(42)]]);

    // and back to text, which matches the stored decoders again
    let out = engine
        .build_execute(
            "SELECT $1::int4",
            &[Param::Int(7)],
            ResultFormat::Text,
            false,
            None,
        )
        .unwrap();
    assert_eq!(kinds_of(&out), b"BES");

    let mut stream = msg(b'2', b"");
    stream.extend(data_row(&[Some(b"7")]));
    stream.extend(command_complete("SELECT 1"));
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);

    let results = engine.take_result().unwrap().outcome.unwrap();
    assert_eq!(results[0].rows, vec![vec![Value::Int4(7)]]);
}

#[test]
fn lru_eviction_closes_displaced_statement() {
    let mut engine = Engine::with_cache(2, 1);
    connect(&mut engine);

    let run_simple = |engine: &mut Engine, sql: &str, expect: &[u8]| {
        let out = engine
            .build_execute(sql, &[], ResultFormat::Default, false, None)
            .unwrap();
        assert_eq!(kinds_of(&out), expect, "kinds for {sql}");
        let mut stream = Vec::new();
        if expect.contains(&b'C') {
            stream.extend(msg(b'3', b""));
        }
        if expect.contains(&b'P') {
            stream.extend(msg(b'1', b""));
            stream.extend(msg(b'2', b""));
            stream.extend(row_desc(&[("v", 25, 1)]));
        } else {
            stream.extend(row_desc(&[("v", 25, 0)]));
        }
        stream.extend(data_row(&[Some(b"x")]));
        stream.extend(command_complete("SELECT 1"));
        stream.extend(ready(b'I'));
        feed(engine, &stream);
        engine.take_result().unwrap().outcome.unwrap();
        out
    };

    run_simple(&mut engine, "SELECT 'a'", b"Q");
    run_simple(&mut engine, "SELECT 'b'", b"Q");
    // second executions hit the threshold and prepare server-side
    run_simple(&mut engine, "SELECT 'b'", b"PBDES");
    run_simple(&mut engine, "SELECT 'a'", b"PBDES");

    // inserting a third statement evicts the LRU ('b', _pagio_002);
    // its close is piggy-backed in front of the new execute
    let out = run_simple(&mut engine, "SELECT 'c'", b"CQ");
    let close = payload_of(&out, b'C');
    assert_eq!(close, b"S_pagio_002\0");

    // 'a' is still prepared and still served without Parse
    let out = engine
        .build_execute("SELECT 'a'", &[], ResultFormat::Default, false, None)
        .unwrap();
    assert_eq!(kinds_of(&out), b"BES");
}

#[test]
fn server_error_is_captured_until_ready() {
    let mut engine = Engine::new();
    connect(&mut engine);

    engine
        .build_execute("SELECT nope", &[], ResultFormat::Default, false, None)
        .unwrap();

    let mut stream = error_response("42703", "column \"nope\" does not exist");
    // the server may still push messages before the cycle ends
    stream.extend(param_status("application_name", "ignored"));
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);

    let result = engine.take_result().unwrap();
    assert!(!result.retryable);
    let err = result.outcome.unwrap_err();
    assert_eq!(err.sqlstate(), Some("42703"));

    // the engine is usable again
    assert_eq!(engine.status(), Status::ReadyForQuery);
    let out = engine
        .build_execute("SELECT 1", &[], ResultFormat::Default, false, None)
        .unwrap();
    assert_eq!(kinds_of(&out), b"Q");
}

#[test]
fn decode_error_is_captured_like_a_server_error() {
    let mut engine = Engine::new();
    connect(&mut engine);

    engine
        .build_execute("SELECT 1", &[], ResultFormat::Default, false, None)
        .unwrap();

    let mut stream = row_desc(&[("v", 23, 0)]);
    stream.extend(data_row(&[Some(b"not-a-number")]));
    stream.extend(command_complete("SELECT 1"));
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);

    let result = engine.take_result().unwrap();
    assert!(matches!(result.outcome, Err(Error::Decode(_))));
    assert_eq!(engine.status(), Status::ReadyForQuery);
}

#[test]
fn cached_plan_error_detaches_and_reports_retryable() {
    let mut engine = Engine::with_cache(2, 1);
    connect(&mut engine);

    let respond_ok = |engine: &mut Engine, with_parse: bool| {
        let mut stream = Vec::new();
        if with_parse {
            stream.extend(msg(b'1', b""));
        }
        stream.extend(msg(b'2', b""));
        stream.extend(row_desc(&[("v", 25, 1)]));
        stream.extend(data_row(&[Some(b"y")]));
        stream.extend(command_complete("SELECT 1"));
        stream.extend(ready(b'I'));
        feed(engine, &stream);
        engine.take_result().unwrap().outcome.unwrap();
    };

    for (kinds, with_parse) in [(&b"Q"[..], false), (&b"PBDES"[..], true)] {
        let out = engine
            .build_execute("SELECT 'y'", &[], ResultFormat::Default, false, None)
            .unwrap();
        assert_eq!(kinds_of(&out), kinds);
        if with_parse {
            respond_ok(&mut engine, true);
        } else {
            let mut stream = row_desc(&[("v", 25, 0)]);
            stream.extend(data_row(&[Some(b"y")]));
            stream.extend(command_complete("SELECT 1"));
            stream.extend(ready(b'I'));
            feed(&mut engine, &stream);
            engine.take_result().unwrap().outcome.unwrap();
        }
    }

    // prepared execution fails with a stale cached plan
    let out = engine
        .build_execute("SELECT 'y'", &[], ResultFormat::Default, false, None)
        .unwrap();
    assert_eq!(kinds_of(&out), b"BES");
    let mut stream = error_response("0A000", "cached plan must not change result type");
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);

    let result = engine.take_result().unwrap();
    assert!(result.retryable);
    assert!(result.outcome.is_err());

    // the retry re-executes from scratch, closing the stale statement
    let out = engine
        .build_execute("SELECT 'y'", &[], ResultFormat::Default, false, None)
        .unwrap();
    assert_eq!(kinds_of(&out), b"CQ");
    assert_eq!(payload_of(&out, b'C'), b"S_pagio_001\0");
}

#[test]
fn discard_all_wipes_cache_at_ready() {
    let mut engine = Engine::with_cache(4, 1);
    connect(&mut engine);

    let respond_simple = |engine: &mut Engine, tag: &str| {
        let mut stream = command_complete(tag);
        stream.extend(ready(b'I'));
        feed(engine, &stream);
        engine.take_result().unwrap().outcome.unwrap();
    };

    // prepare a statement
    for expect in [&b"Q"[..], &b"PBDES"[..]] {
        let out = engine
            .build_execute("SET search_path TO app", &[], ResultFormat::Default, false, None)
            .unwrap();
        assert_eq!(kinds_of(&out), expect);
        let mut stream = Vec::new();
        if expect.contains(&b'P') {
            stream.extend(msg(b'1', b""));
            stream.extend(msg(b'2', b""));
            stream.extend(msg(b'n', b""));
        }
        stream.extend(command_complete("SET"));
        stream.extend(ready(b'I'));
        feed(&mut engine, &stream);
        engine.take_result().unwrap().outcome.unwrap();
    }

    let out = engine
        .build_execute("DISCARD ALL", &[], ResultFormat::Default, false, None)
        .unwrap();
    assert_eq!(kinds_of(&out), b"Q");
    respond_simple(&mut engine, "DISCARD ALL");

    // everything is forgotten: the statement starts from scratch and
    // no close is pending
    let out = engine
        .build_execute("SET search_path TO app", &[], ResultFormat::Default, false, None)
        .unwrap();
    assert_eq!(kinds_of(&out), b"Q");
}

#[test]
fn copy_out_accumulates_raw_rows() {
    let mut engine = Engine::new();
    connect(&mut engine);

    engine
        .build_execute("COPY t TO STDOUT", &[], ResultFormat::Default, false, None)
        .unwrap();

    let mut copy_out = vec![0u8];
    copy_out.extend_from_slice(&1_u16.to_be_bytes());
    copy_out.extend_from_slice(&0_u16.to_be_bytes());
    let mut stream = msg(b'H', &copy_out);
    stream.extend(msg(b'd', b"1\tone\n"));
    stream.extend(msg(b'd', b"2\ttwo\n"));
    stream.extend(msg(b'c', b""));
    stream.extend(command_complete("COPY 2"));
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);

    let results = engine.take_result().unwrap().outcome.unwrap();
    assert_eq!(results[0].tag, "COPY 2");
    assert_eq!(
        results[0].rows,
        vec![
            vec![Value::Bytes(b"1\tone\n".to_vec())],
            vec![Value::Bytes(b"2\ttwo\n".to_vec())],
        ]
    );
}

#[test]
fn copy_in_sends_data_or_fails() {
    let mut copy_in = vec![0u8];
    copy_in.extend_from_slice(&1_u16.to_be_bytes());
    copy_in.extend_from_slice(&0_u16.to_be_bytes());

    // with a source: CopyData + CopyDone go out
    let mut engine = Engine::new();
    connect(&mut engine);
    engine
        .build_execute(
            "COPY t FROM STDIN",
            &[],
            ResultFormat::Default,
            false,
            Some(b"1\tone\n".to_vec()),
        )
        .unwrap();
    feed(&mut engine, &msg(b'G', &copy_in));
    let outgoing = engine.take_outgoing().unwrap();
    assert_eq!(kinds_of(&outgoing), b"dc");
    assert_eq!(payload_of(&outgoing, b'd'), b"1\tone\n");

    let mut stream = command_complete("COPY 1");
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);
    assert!(engine.take_result().unwrap().outcome.is_ok());

    // without a source: CopyFail goes out
    let mut engine = Engine::new();
    connect(&mut engine);
    engine
        .build_execute("COPY t FROM STDIN", &[], ResultFormat::Default, false, None)
        .unwrap();
    feed(&mut engine, &msg(b'G', &copy_in));
    let outgoing = engine.take_outgoing().unwrap();
    assert_eq!(kinds_of(&outgoing), b"f");

    let mut stream = error_response("57014", "COPY from stdin failed");
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);
    assert!(engine.take_result().unwrap().outcome.is_err());
}

#[test]
fn raw_mode_bypasses_the_registry() {
    let mut engine = Engine::new();
    connect(&mut engine);

    engine
        .build_execute("SELECT 1", &[], ResultFormat::Default, true, None)
        .unwrap();
    let mut stream = row_desc(&[("v", 23, 0)]);
    stream.extend(data_row(&[Some(b"42")]));
    stream.extend(command_complete("SELECT 1"));
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);

    let results = engine.take_result().unwrap().outcome.unwrap();
    assert_eq!(results[0].rows, vec![vec![Value::Text("42".into())]]);
}

#[test]
fn notifications_surface_as_async_messages() {
    let mut engine = Engine::new();
    connect(&mut engine);

    engine
        .build_execute("SELECT pg_sleep(1)", &[], ResultFormat::Default, false, None)
        .unwrap();

    let mut notify = 99_u32.to_be_bytes().to_vec();
    notify.extend_from_slice(b"jobs\0run 17\0");
    let mut stream = msg(b'A', &notify);
    stream.extend(row_desc(&[("pg_sleep", 2278, 0)]));
    stream.extend(data_row(&[Some(b"")]));
    stream.extend(command_complete("SELECT 1"));
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);

    let Some(AsyncMessage::Notification { pid, channel, payload }) = engine.take_async_message()
    else {
        panic!("expected notification");
    };
    assert_eq!((pid, channel.as_str(), payload.as_str()), (99, "jobs", "run 17"));
    assert!(engine.take_result().unwrap().outcome.is_ok());
}

#[test]
fn session_parameters_update_mid_session() {
    let mut engine = Engine::new();
    connect(&mut engine);
    assert_eq!(engine.session().parameter("server_version"), Some("16.3"));

    feed(&mut engine, &param_status("TimeZone", "Europe/Amsterdam"));
    assert_eq!(
        engine.session().timezone(),
        Some(chrono_tz::Europe::Amsterdam)
    );
    let Some(AsyncMessage::ParameterChanged { name, value }) = engine.take_async_message() else {
        panic!("expected parameter change");
    };
    assert_eq!((name.as_str(), value.as_str()), ("TimeZone", "Europe/Amsterdam"));
}

#[test]
fn non_utf8_client_encoding_is_fatal() {
    let mut engine = Engine::new();
    engine
        .start_up(&[("user", "tester")], None)
        .unwrap();
    let mut stream = msg(b'R', &0_i32.to_be_bytes());
    stream.extend(param_status("client_encoding", "LATIN1"));
    let err = try_feed(&mut engine, &stream).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn md5_authentication_round() {
    let mut engine = Engine::new();
    engine
        .start_up(&[("user", "tester")], Some("hunter2"))
        .unwrap();

    let mut md5 = 5_i32.to_be_bytes().to_vec();
    md5.extend_from_slice(&[1, 2, 3, 4]);
    feed(&mut engine, &msg(b'R', &md5));

    let outgoing = engine.take_outgoing().unwrap();
    assert_eq!(outgoing[0], b'p');
    assert!(outgoing[5..].starts_with(b"md5"));
    assert_eq!(outgoing.len(), 5 + 35 + 1);

    feed(&mut engine, &auth_ok_stream());
    assert_eq!(engine.status(), Status::ReadyForQuery);
}

#[test]
fn scram_authentication_starts_the_exchange() {
    let mut engine = Engine::new();
    engine
        .start_up(&[("user", "tester")], Some("hunter2"))
        .unwrap();

    let mut sasl = 10_i32.to_be_bytes().to_vec();
    sasl.extend_from_slice(b"SCRAM-SHA-256\0\0");
    feed(&mut engine, &msg(b'R', &sasl));

    let outgoing = engine.take_outgoing().unwrap();
    assert_eq!(outgoing[0], b'p');
    assert!(outgoing[5..].starts_with(b"SCRAM-SHA-256\0"));
    // gs2 header and empty username of the client-first-message
    let initial = &outgoing[5 + 14 + 4..];
    assert!(initial.starts_with(b"n,,n=,r="));
}

#[test]
fn unsupported_sasl_mechanism_fails() {
    let mut engine = Engine::new();
    engine
        .start_up(&[("user", "tester")], Some("hunter2"))
        .unwrap();

    let mut sasl = 10_i32.to_be_bytes().to_vec();
    sasl.extend_from_slice(b"SCRAM-SHA-1\0\0");
    let err = try_feed(&mut engine, &msg(b'R', &sasl)).unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}

#[test]
fn startup_error_response_is_fatal() {
    let mut engine = Engine::new();
    engine.start_up(&[("user", "tester")], None).unwrap();
    let err = try_feed(
        &mut engine,
        &error_response("28P01", "password authentication failed"),
    )
    .unwrap_err();
    assert_eq!(err.sqlstate(), Some("28P01"));
}

#[test]
fn empty_query_yields_empty_result() {
    let mut engine = Engine::new();
    connect(&mut engine);

    engine
        .build_execute("", &[], ResultFormat::Default, false, None)
        .unwrap();
    let mut stream = msg(b'I', b"");
    stream.extend(ready(b'I'));
    feed(&mut engine, &stream);

    let results = engine.take_result().unwrap().outcome.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tag, "");
    assert!(results[0].rows.is_empty());
}

#[test]
fn transaction_status_is_tracked() {
    let mut engine = Engine::new();
    connect(&mut engine);

    engine
        .build_execute("BEGIN", &[], ResultFormat::Default, false, None)
        .unwrap();
    let mut stream = command_complete("BEGIN");
    stream.extend(ready(b'T'));
    feed(&mut engine, &stream);

    let result = engine.take_result().unwrap();
    assert_eq!(result.transaction_status, TransactionStatus::InTransaction);
    assert_eq!(engine.transaction_status(), TransactionStatus::InTransaction);
}

#[test]
fn cancel_payload_uses_backend_key() {
    let mut engine = Engine::new();
    connect(&mut engine);

    let cancel = engine.build_cancel().unwrap();
    assert_eq!(cancel.len(), 16);
    assert_eq!(&cancel[0..4], &16_i32.to_be_bytes());
    assert_eq!(&cancel[4..8], &80877102_i32.to_be_bytes());
    assert_eq!(&cancel[8..12], &4321_u32.to_be_bytes());
    assert_eq!(&cancel[12..16], &0xdead_beef_u32.to_be_bytes());
}
