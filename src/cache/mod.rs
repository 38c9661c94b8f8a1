// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! AV cache over a RESP-speaking backend.
//!
//! One TCP connection, exactly one in-flight command: callers queue on the
//! connection mutex. Commands are not multiplexed. On any I/O error the
//! connection is discarded, the current call fails with `CacheUnavailable`,
//! and the next call redials.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream},
    net::TcpStream,
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    client::common::io_with_timeout,
    models::{av::Av, errors::GbaError},
};

pub struct AvCache {
    addr: String,
    timeout: Duration,
    conn: Mutex<Option<BufStream<TcpStream>>>,
    cancel: CancellationToken,
}

impl AvCache {
    pub fn new(addr: String, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            addr,
            timeout,
            conn: Mutex::new(None),
            cancel,
        }
    }

    /// Looks up a vector by B-TID. `None` covers both "no entry" and
    /// "TTL elapsed": strict expiry, the backend never serves stale data.
    pub async fn get(
        &self,
        btid: &str,
    ) -> Result<Option<(Av, DateTime<Utc>)>, GbaError> {
        let mut slot = self.conn.lock().await;
        match self.get_inner(&mut slot, btid).await {
            Ok(v) => Ok(v),
            Err(e) => {
                *slot = None;
                warn!("cache GET failed: {e}");
                Err(GbaError::CacheUnavailable(e.to_string()))
            },
        }
    }

    /// Stores a vector under its B-TID with an absolute UNIX expiry.
    /// Last writer wins; resync overwrites by design of the key.
    pub async fn set(
        &self,
        btid: &str,
        av: &Av,
        expires_at: DateTime<Utc>,
    ) -> Result<(), GbaError> {
        let mut slot = self.conn.lock().await;
        match self.set_inner(&mut slot, btid, av, expires_at).await {
            Ok(()) => Ok(()),
            Err(e) => {
                *slot = None;
                warn!("cache SET failed: {e}");
                Err(GbaError::CacheUnavailable(e.to_string()))
            },
        }
    }

    async fn connect(&self) -> anyhow::Result<BufStream<TcpStream>> {
        let stream = io_with_timeout(
            "cache connect",
            TcpStream::connect(&self.addr),
            self.timeout,
            &self.cancel,
        )
        .await?;
        stream.set_nodelay(true)?;
        Ok(BufStream::new(stream))
    }

    async fn get_inner(
        &self,
        slot: &mut Option<BufStream<TcpStream>>,
        btid: &str,
    ) -> anyhow::Result<Option<(Av, DateTime<Utc>)>> {
        if slot.is_none() {
            *slot = Some(self.connect().await?);
        }
        let conn = slot.as_mut().ok_or_else(|| anyhow::anyhow!("no connection"))?;

        send_command(conn, &["GET", btid], self.timeout, &self.cancel).await?;
        let line = read_line(conn, self.timeout, &self.cancel).await?;
        let record = match line.as_bytes().first() {
            // RESP3 null / RESP2 null bulk
            Some(b'_') => None,
            Some(b'$') => {
                let len: i64 = line[1..].trim().parse()?;
                if len < 0 {
                    None
                } else {
                    let mut data = vec![0u8; len as usize + 2];
                    io_with_timeout(
                        "cache read bulk",
                        conn.read_exact(&mut data),
                        self.timeout,
                        &self.cancel,
                    )
                    .await?;
                    data.truncate(len as usize);
                    Some(data)
                }
            },
            _ => anyhow::bail!("unexpected GET reply: {line:?}"),
        };

        let Some(record) = record else {
            return Ok(None);
        };
        let av = match Av::from_record(&String::from_utf8(record)?) {
            Ok(av) => av,
            Err(e) => {
                // A corrupt record is a miss, not an outage.
                debug!("discarding malformed cache record: {e}");
                return Ok(None);
            },
        };

        send_command(conn, &["TTL", btid], self.timeout, &self.cancel).await?;
        let line = read_line(conn, self.timeout, &self.cancel).await?;
        match line.as_bytes().first() {
            Some(b':') => {
                let secs: i64 = line[1..].trim().parse()?;
                if secs < 0 {
                    return Ok(None);
                }
                Ok(Some((av, Utc::now() + Duration::from_secs(secs as u64))))
            },
            _ => anyhow::bail!("unexpected TTL reply: {line:?}"),
        }
    }

    async fn set_inner(
        &self,
        slot: &mut Option<BufStream<TcpStream>>,
        btid: &str,
        av: &Av,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if slot.is_none() {
            *slot = Some(self.connect().await?);
        }
        let conn = slot.as_mut().ok_or_else(|| anyhow::anyhow!("no connection"))?;

        let record = av.to_record();
        let exat = expires_at.timestamp().to_string();
        send_command(
            conn,
            &["SET", btid, &record, "EXAT", &exat],
            self.timeout,
            &self.cancel,
        )
        .await?;

        let line = read_line(conn, self.timeout, &self.cancel).await?;
        match line.as_bytes().first() {
            Some(b'+' | b'$') => Ok(()),
            Some(b'-') => anyhow::bail!("backend refused SET: {}", line.trim()),
            _ => anyhow::bail!("unexpected SET reply: {line:?}"),
        }
    }
}

async fn send_command(
    conn: &mut BufStream<TcpStream>,
    args: &[&str],
    io_timeout: Duration,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let mut out = format!("*{}\r\n", args.len());
    for a in args {
        out.push_str(&format!("${}\r\n{a}\r\n", a.len()));
    }
    io_with_timeout(
        "cache write",
        conn.write_all(out.as_bytes()),
        io_timeout,
        cancel,
    )
    .await?;
    io_with_timeout("cache flush", conn.flush(), io_timeout, cancel).await?;
    Ok(())
}

async fn read_line(
    conn: &mut BufStream<TcpStream>,
    io_timeout: Duration,
    cancel: &CancellationToken,
) -> anyhow::Result<String> {
    let mut line = String::new();
    let n = io_with_timeout(
        "cache read line",
        conn.read_line(&mut line),
        io_timeout,
        cancel,
    )
    .await?;
    anyhow::ensure!(n > 0, "cache connection closed");
    Ok(line)
}
