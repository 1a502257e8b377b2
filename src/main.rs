use std::{env, process::exit};
use sysshim::sys::{HostKernel, Kernel, PollFd, SigHow};
use sysshim::{Config, Shim, ShimBuilder, SigSet, Timespec, die};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: sysshim [--strace] [--memcheck|--no-memcheck] <info|openpt|wait <fd> [seconds]|die>";

enum Command {
    /// Print the platform and the guarantees it provides.
    Info,
    /// Allocate a pseudo-terminal and print its slave path.
    Openpt,
    /// Wait for `fd` to become readable with SIGINT blocked.
    Wait { fd: i32, seconds: Option<i64> },
    /// Abort through the fatal abort coordinator.
    Die,
}

struct Opts {
    config: Config,
    command: Command,
}

fn main() {
    setup_logging();

    die::install_crash_handlers();

    let args: Vec<String> = env::args().collect();
    let opts = match parse_opts(&args) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("sysshim: {}", msg);
            eprintln!("{}", USAGE);
            exit(2);
        }
    };

    let shim = ShimBuilder::from_config(opts.config).build(HostKernel);
    let result = match opts.command {
        Command::Info => info(&shim),
        Command::Openpt => openpt(&shim),
        Command::Wait { fd, seconds } => wait(&shim, fd, seconds),
        Command::Die => die::die(),
    };
    if let Err(e) = result {
        eprintln!("sysshim: {}", e);
        exit(1);
    }
}

fn info(shim: &Shim) -> sysshim::Result<()> {
    let platform = shim.platform();
    println!("platform:   {}", platform);
    println!("pty:        {:?}", platform.pty_primitive());
    println!("sigmask:    {:?} (expected)", platform.sigmask_wait());

    // An empty wait with the current mask is enough to learn what the
    // kernel actually does.
    let current = shim.kernel().sigprocmask(SigHow::Block, None)?;
    shim.ppoll(&mut [], Some(&Timespec::new(0, 0)), Some(&current))?;
    println!("sigmask:    {:?} (observed)", shim.sigmask_guarantee());
    println!("memcheck:   {}", shim.address_check().name());
    Ok(())
}

fn openpt(shim: &Shim) -> sysshim::Result<()> {
    let pty = shim.open_pty(libc::O_NOCTTY)?;
    println!("{}", pty.name);
    if let Err(e) = shim.kernel().close(pty.master) {
        tracing::debug!("closing pty master {}: {}", pty.master, e);
    }
    Ok(())
}

fn wait(shim: &Shim, fd: i32, seconds: Option<i64>) -> sysshim::Result<()> {
    let mask: SigSet = shim
        .kernel()
        .sigprocmask(SigHow::Block, None)?
        .with(libc::SIGINT);
    let deadline = seconds.map(|s| Timespec::new(s, 0));
    let mut fds = [PollFd::new(fd, PollFd::IN)];
    let ready = shim.ppoll(&mut fds, deadline.as_ref(), Some(&mask))?;
    if ready == 0 {
        println!("timed out");
    } else {
        println!("ready: revents={:#x}", fds[0].revents);
    }
    Ok(())
}

fn parse_opts(args: &[String]) -> Result<Opts, String> {
    let mut config = Config::from_env();
    let mut command = None;
    let mut i = 1; // Skip program name
    while i < args.len() {
        match args[i].as_str() {
            "--strace" => config.strace = true,
            "--memcheck" => config.memcheck = true,
            "--no-memcheck" => config.memcheck = false,
            "info" => command = Some(Command::Info),
            "openpt" => command = Some(Command::Openpt),
            "die" => command = Some(Command::Die),
            "wait" => {
                let fd: i32 = args
                    .get(i + 1)
                    .ok_or("wait: missing file descriptor")?
                    .parse()
                    .map_err(|_| "wait: file descriptor must be a number")?;
                i += 1;
                let seconds = match args.get(i + 1).map(|s| s.parse::<i64>()) {
                    Some(Ok(s)) => {
                        i += 1;
                        Some(s)
                    }
                    _ => None,
                };
                command = Some(Command::Wait { fd, seconds });
            }
            other => return Err(format!("unknown argument {:?}", other)),
        }
        i += 1;
    }
    let command = command.ok_or("missing command")?;
    Ok(Opts { config, command })
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
