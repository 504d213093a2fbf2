use std::io::{self, BufRead, BufReader};
use std::sync::Arc;
use std::thread;

use amulet_engine::Dispatcher;
use amulet_logging::{amulet_debug, amulet_info, amulet_warn};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Feed stdin into the dispatcher, one post per line.
///
/// The returned receiver resolves with the number of posts submitted once the
/// input ends. The reader is a plain thread: a pending read on stdin cannot be
/// interrupted, so it is left detached and dies with the process.
pub fn spawn_stdin_source(
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) -> io::Result<oneshot::Receiver<u64>> {
    spawn_line_source(BufReader::new(io::stdin()), dispatcher, cancel)
}

pub fn spawn_line_source<R>(
    input: R,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) -> io::Result<oneshot::Receiver<u64>>
where
    R: BufRead + Send + 'static,
{
    let (done, finished) = oneshot::channel();
    thread::Builder::new()
        .name("line-source".to_string())
        .spawn(move || {
            let submitted = read_lines(input, &dispatcher, &cancel);
            amulet_info!("Input source stopped after {} posts", submitted);
            let _ = done.send(submitted);
        })?;
    Ok(finished)
}

fn read_lines<R: BufRead>(mut input: R, dispatcher: &Dispatcher, cancel: &CancellationToken) -> u64 {
    let mut submitted = 0;
    let mut line = Vec::new();
    loop {
        line.clear();
        match input.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                amulet_warn!("Failed to read input: {}", err);
                break;
            }
        }
        if cancel.is_cancelled() {
            break;
        }

        let Ok(text) = std::str::from_utf8(&line) else {
            amulet_warn!("Skipping a post that is not valid UTF-8");
            continue;
        };
        let text = text.trim_end_matches(['\n', '\r']);
        if text.trim().is_empty() {
            continue;
        }
        if let Err(err) = dispatcher.submit(text) {
            amulet_debug!("Input source stopping: {}", err);
            break;
        }
        submitted += 1;
    }
    submitted
}
