//! Response model with a streamed, single-take body.
//!
//! A [`Response`] is a shared handle: `clone()` yields another handle to the
//! same underlying response, which is how the interceptor hands one response
//! to both the caller and its own observers. The body reader can be taken
//! exactly once; [`Response::try_clone`] instead tees the body so two
//! independent readers each see every chunk, which is what the body drain
//! uses to observe streamed bodies without stealing them from the caller.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;

use crate::error::{FaultlineError, Result};

/// Chunked body payload, as produced by the HTTP backend.
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

enum BodyState {
    Stream(ChunkStream),
    Taken,
}

struct ResponseInner {
    status: u16,
    url: String,
    headers: HashMap<String, String>,
    body: Mutex<BodyState>,
}

/// A response handle. Cloning shares the same response identity and body.
pub struct Response {
    inner: Arc<ResponseInner>,
}

impl Clone for Response {
    fn clone(&self) -> Self {
        Response {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.inner.status)
            .field("url", &self.inner.url)
            .finish()
    }
}

impl Response {
    pub fn new(
        status: u16,
        url: impl Into<String>,
        headers: HashMap<String, String>,
        body: ChunkStream,
    ) -> Self {
        Response {
            inner: Arc::new(ResponseInner {
                status,
                url: url.into(),
                headers,
                body: Mutex::new(BodyState::Stream(body)),
            }),
        }
    }

    /// Builds a response with an in-memory body. Intended for backends that
    /// already hold the whole payload, and for tests.
    pub fn from_bytes(status: u16, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let chunks: Vec<Result<Bytes>> = if body.is_empty() { vec![] } else { vec![Ok(body)] };
        Self::new(status, url, HashMap::new(), futures::stream::iter(chunks).boxed())
    }

    pub(crate) fn from_reqwest(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            headers.insert(
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        let body = response.bytes_stream().map_err(FaultlineError::from).boxed();
        Self::new(status, url, headers, body)
    }

    pub fn status(&self) -> u16 {
        self.inner.status
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        self.inner.status >= 200 && self.inner.status < 300
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.inner.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).map(String::as_str)
    }

    /// True when both handles refer to the same underlying response.
    pub fn same_response(&self, other: &Response) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Takes the body reader. Fails with [`FaultlineError::BodyConsumed`] if
    /// it was already taken from any handle to this response.
    pub fn bytes_stream(&self) -> Result<ChunkStream> {
        let mut body = self.inner.body.lock().unwrap();
        match std::mem::replace(&mut *body, BodyState::Taken) {
            BodyState::Stream(stream) => Ok(stream),
            BodyState::Taken => Err(FaultlineError::BodyConsumed),
        }
    }

    /// Tees the body into a second, independent response.
    ///
    /// Both this response and the returned one observe every remaining body
    /// chunk. Returns `None` when the body reader has already been taken,
    /// mirroring the clone failure of an already-consumed platform response.
    pub fn try_clone(&self) -> Option<Response> {
        let mut body = self.inner.body.lock().unwrap();
        let stream = match std::mem::replace(&mut *body, BodyState::Taken) {
            BodyState::Stream(stream) => stream,
            BodyState::Taken => return None,
        };

        let (ours, theirs) = tee(stream);
        *body = BodyState::Stream(ours.boxed());

        Some(Response {
            inner: Arc::new(ResponseInner {
                status: self.inner.status,
                url: self.inner.url.clone(),
                headers: self.inner.headers.clone(),
                body: Mutex::new(BodyState::Stream(theirs.boxed())),
            }),
        })
    }

    /// Drains the body and returns it whole.
    pub async fn bytes(&self) -> Result<Bytes> {
        let mut stream = self.bytes_stream()?;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }

    /// Drains the body and decodes it as UTF-8 text (lossily).
    pub async fn text(&self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Drains the body and deserializes it as JSON.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

struct TeeShared {
    source: Option<ChunkStream>,
    buffers: [VecDeque<Result<Bytes>>; 2],
    wakers: [Option<Waker>; 2],
    detached: [bool; 2],
    done: bool,
}

/// One side of a teed body stream.
///
/// Whichever branch polls first pulls the source on behalf of both; chunks a
/// branch pulls are buffered for the other until it catches up.
struct TeeBranch {
    shared: Arc<Mutex<TeeShared>>,
    index: usize,
}

fn tee(source: ChunkStream) -> (TeeBranch, TeeBranch) {
    let shared = Arc::new(Mutex::new(TeeShared {
        source: Some(source),
        buffers: [VecDeque::new(), VecDeque::new()],
        wakers: [None, None],
        detached: [false, false],
        done: false,
    }));

    (
        TeeBranch {
            shared: Arc::clone(&shared),
            index: 0,
        },
        TeeBranch { shared, index: 1 },
    )
}

impl Stream for TeeBranch {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let index = self.index;
        let other = 1 - index;
        let mut shared = self.shared.lock().unwrap();

        if let Some(item) = shared.buffers[index].pop_front() {
            return Poll::Ready(Some(item));
        }
        if shared.done {
            return Poll::Ready(None);
        }

        let polled = match shared.source.as_mut() {
            Some(source) => source.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        };

        match polled {
            Poll::Ready(Some(Ok(chunk))) => {
                if !shared.detached[other] {
                    shared.buffers[other].push_back(Ok(chunk.clone()));
                    if let Some(waker) = shared.wakers[other].take() {
                        waker.wake();
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(error))) => {
                // Crate errors are not clonable; the branch that pulled the
                // failure gets it verbatim, the other a descriptive stand-in.
                shared.done = true;
                shared.source = None;
                if !shared.detached[other] {
                    shared.buffers[other]
                        .push_back(Err(FaultlineError::BodyStreamError(error.to_string())));
                    if let Some(waker) = shared.wakers[other].take() {
                        waker.wake();
                    }
                }
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                shared.done = true;
                shared.source = None;
                if let Some(waker) = shared.wakers[other].take() {
                    waker.wake();
                }
                Poll::Ready(None)
            }
            Poll::Pending => {
                shared.wakers[index] = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl Drop for TeeBranch {
    fn drop(&mut self) {
        let mut shared = self.shared.lock().unwrap();
        shared.detached[self.index] = true;
        shared.buffers[self.index].clear();
        // The source may hold this branch's waker; hand polling duty over.
        if let Some(waker) = shared.wakers[1 - self.index].take() {
            waker.wake();
        }
    }
}
