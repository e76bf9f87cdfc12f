use super::enforce;
use crate::directory::{Backend, ResultCode};
use futures::{SinkExt, StreamExt};
use ldap3_proto::{
    proto::{
        LdapBindCred, LdapBindRequest, LdapBindResponse, LdapExtendedResponse, LdapMsg, LdapOp,
        LdapResult, LdapSearchRequest,
    },
    LdapCodec,
};
use secrecy::SecretString;
use std::{future::Future, io, sync::Arc};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};
use tokio_util::codec::Framed;
use tracing::{debug, info, info_span, warn, Instrument};
use ulid::Ulid;

fn ldap_result(code: ResultCode) -> LdapResult {
    LdapResult {
        code: code.into(),
        matcheddn: String::new(),
        message: String::new(),
        referral: vec![],
    }
}

/// Accept connections until `shutdown` resolves, one task per connection.
///
/// # Errors
/// Returns an error if the listener address cannot be read.
pub async fn serve<B, F>(listener: TcpListener, backend: Arc<B>, shutdown: F) -> io::Result<()>
where
    B: Backend + ?Sized,
    F: Future<Output = ()>,
{
    info!("Listening on {}", listener.local_addr()?);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Gracefully shutdown");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let span = info_span!("ldap.connection", conn_id = %Ulid::new(), %peer);
                    tokio::spawn(handle(stream, Arc::clone(&backend)).instrument(span));
                }
                Err(err) => warn!("Failed to accept connection: {err}"),
            }
        }
    }

    Ok(())
}

/// Serve one client until it unbinds, disconnects or sends something undecodable.
pub async fn handle<S, B>(stream: S, backend: Arc<B>)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    B: Backend + ?Sized,
{
    debug!("connection opened");

    let mut framed = Framed::new(stream, LdapCodec::default());
    let mut bound = String::new();

    while let Some(message) = framed.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                warn!("Failed to decode LDAP message: {err}");
                break;
            }
        };

        let msgid = message.msgid;
        let replies = match message.op {
            LdapOp::BindRequest(request) => vec![bind(backend.as_ref(), &mut bound, request).await],
            LdapOp::SearchRequest(request) => search(backend.as_ref(), &bound, &request).await,
            LdapOp::UnbindRequest => {
                debug!("unbind");
                break;
            }
            LdapOp::AbandonRequest(_) => continue,
            _ => {
                warn!(msgid, "unsupported operation");
                vec![LdapOp::ExtendedResponse(LdapExtendedResponse {
                    res: ldap_result(ResultCode::OperationsError),
                    name: None,
                    value: None,
                })]
            }
        };

        if let Err(err) = reply(&mut framed, msgid, replies).await {
            warn!("Failed to send LDAP response: {err}");
            break;
        }
    }

    let mut stream = framed.into_inner();
    if let Err(err) = backend.close(&bound, &mut stream).await {
        warn!("Failed to close connection: {err}");
    }

    debug!("connection closed");
}

async fn reply<S>(
    framed: &mut Framed<S, LdapCodec>,
    msgid: i32,
    ops: Vec<LdapOp>,
) -> Result<(), io::Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for op in ops {
        framed
            .feed(LdapMsg {
                msgid,
                op,
                ctrl: vec![],
            })
            .await?;
    }
    framed.flush().await
}

async fn bind<B>(backend: &B, bound: &mut String, request: LdapBindRequest) -> LdapOp
where
    B: Backend + ?Sized,
{
    let LdapBindRequest { dn, cred } = request;

    let code = match cred {
        LdapBindCred::Simple(password) => backend.bind(&dn, SecretString::from(password)).await,
        _ => {
            warn!(identity = %dn, "bind rejected: only simple authentication is supported");
            ResultCode::InvalidCredentials
        }
    };

    *bound = if code == ResultCode::Success {
        dn
    } else {
        String::new()
    };

    LdapOp::BindResponse(LdapBindResponse {
        res: ldap_result(code),
        saslcreds: None,
    })
}

async fn search<B>(backend: &B, bound: &str, request: &LdapSearchRequest) -> Vec<LdapOp>
where
    B: Backend + ?Sized,
{
    let result = backend.search(bound, request).await;

    let mut ops: Vec<LdapOp> = if result.code == ResultCode::Success {
        enforce::apply(request, &result.entries)
            .into_iter()
            .map(LdapOp::SearchResultEntry)
            .collect()
    } else {
        Vec::new()
    };
    debug!(
        candidates = result.entries.len(),
        returned = ops.len(),
        "search result"
    );

    ops.push(LdapOp::SearchResultDone(ldap_result(result.code)));
    ops
}
