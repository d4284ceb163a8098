//! Platform transport: a Unix domain socket, or a named pipe on Windows.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[cfg(windows)]
pub fn default_endpoint() -> String {
    r"\\.\pipe\QuickTypePipe".to_string()
}

#[cfg(not(windows))]
pub fn default_endpoint() -> String {
    let base = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
    base.join("quicktype.sock").display().to_string()
}

#[cfg(unix)]
mod imp {
    use std::io;
    use std::path::PathBuf;

    use tokio::net::{UnixListener, UnixStream};

    use super::{BoxedReader, BoxedWriter};

    pub struct Listener {
        inner: UnixListener,
        path: PathBuf,
    }

    impl Listener {
        pub async fn bind(endpoint: &str) -> io::Result<Self> {
            let path = PathBuf::from(endpoint);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if path.exists() {
                tokio::fs::remove_file(&path).await?;
            }
            let inner = UnixListener::bind(&path)?;
            Ok(Self { inner, path })
        }

        pub async fn accept(&mut self) -> io::Result<(BoxedReader, BoxedWriter)> {
            let (stream, _) = self.inner.accept().await?;
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
    }

    impl Drop for Listener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub async fn connect(endpoint: &str) -> io::Result<(BoxedReader, BoxedWriter)> {
        let stream = UnixStream::connect(endpoint).await?;
        let (reader, writer) = stream.into_split();
        Ok((Box::new(reader), Box::new(writer)))
    }
}

#[cfg(windows)]
mod imp {
    use std::io;

    use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeServer, ServerOptions};

    use super::{BoxedReader, BoxedWriter};

    pub struct Listener {
        name: String,
        next: NamedPipeServer,
    }

    impl Listener {
        pub async fn bind(endpoint: &str) -> io::Result<Self> {
            let next = ServerOptions::new()
                .first_pipe_instance(true)
                .create(endpoint)?;
            Ok(Self {
                name: endpoint.to_string(),
                next,
            })
        }

        pub async fn accept(&mut self) -> io::Result<(BoxedReader, BoxedWriter)> {
            self.next.connect().await?;
            let fresh = ServerOptions::new().create(&self.name)?;
            let connected = std::mem::replace(&mut self.next, fresh);
            let (reader, writer) = tokio::io::split(connected);
            Ok((Box::new(reader), Box::new(writer)))
        }
    }

    pub async fn connect(endpoint: &str) -> io::Result<(BoxedReader, BoxedWriter)> {
        let client = ClientOptions::new().open(endpoint)?;
        let (reader, writer) = tokio::io::split(client);
        Ok((Box::new(reader), Box::new(writer)))
    }
}

pub use imp::Listener;

/// Open one connection to `endpoint`.
pub async fn connect(endpoint: &str) -> io::Result<(BoxedReader, BoxedWriter)> {
    imp::connect(endpoint).await
}

/// Bind the server side of `endpoint`.
pub async fn bind(endpoint: &str) -> io::Result<Listener> {
    Listener::bind(endpoint).await
}
