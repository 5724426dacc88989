//! The command table.

use tracing::debug;

use crate::choose_command::{choose_buffer, choose_window, DEFAULT_CHOOSE_BUFFER_COMMAND, DEFAULT_CHOOSE_WINDOW_COMMAND};
use crate::cmd::{Args, CmdCtx, CmdEntry};
use crate::error::{CmdError, Result};
use crate::format::{format_paste_buffer, format_session, format_winlink, FormatTree, DEFAULT_BUFFER_TEMPLATE, DEFAULT_WINDOW_TEMPLATE};
use crate::inject::{paste_window, PasteSeparator};
use crate::options::{Options, WindowOptions};
use crate::server::Server;

const DEFAULT_DISPLAY_TEMPLATE: &str = "[#{session_name}] #{window_index}:#{window_name}";

pub static CMD_TABLE: &[CmdEntry] = &[
    CmdEntry {
        name: "choose-buffer", alias: None, args_template: "F:t:", lower: 0, upper: 1,
        usage: "[-F format] [-t target-window] [template]", exec: cmd_choose_buffer,
    },
    CmdEntry {
        name: "choose-window", alias: None, args_template: "F:t:", lower: 0, upper: 1,
        usage: "[-F format] [-t target-window] [template]", exec: cmd_choose_window,
    },
    CmdEntry {
        name: "delete-buffer", alias: Some("deleteb"), args_template: "b:", lower: 0, upper: 0,
        usage: "[-b buffer-index]", exec: cmd_delete_buffer,
    },
    CmdEntry {
        name: "display-message", alias: Some("display"), args_template: "pt:", lower: 0, upper: 1,
        usage: "[-p] [-t target-window] [message]", exec: cmd_display_message,
    },
    CmdEntry {
        name: "list-buffers", alias: Some("lsb"), args_template: "F:", lower: 0, upper: 0,
        usage: "[-F format]", exec: cmd_list_buffers,
    },
    CmdEntry {
        name: "paste-buffer", alias: Some("pasteb"), args_template: "db:prs:t:", lower: 0, upper: 0,
        usage: "[-dpr] [-s separator] [-b buffer-index] [-t target-pane]", exec: cmd_paste_buffer,
    },
    CmdEntry {
        name: "select-window", alias: Some("selectw"), args_template: "lnpt:", lower: 0, upper: 0,
        usage: "[-lnp] [-t target-window]", exec: cmd_select_window,
    },
    CmdEntry {
        name: "set-buffer", alias: Some("setb"), args_template: "b:", lower: 1, upper: 1,
        usage: "[-b buffer-index] data", exec: cmd_set_buffer,
    },
    CmdEntry {
        name: "set-option", alias: Some("set"), args_template: "gt:", lower: 1, upper: 2,
        usage: "[-g] [-t target] option [value]", exec: cmd_set_option,
    },
    CmdEntry {
        name: "set-window-option", alias: Some("setw"), args_template: "gt:", lower: 1, upper: 2,
        usage: "[-g] [-t target-window] option [value]", exec: cmd_set_window_option,
    },
    CmdEntry {
        name: "show-buffer", alias: Some("showb"), args_template: "b:", lower: 0, upper: 0,
        usage: "[-b buffer-index]", exec: cmd_show_buffer,
    },
];

/// `-b` as a buffer index, `None` when not given.
fn buffer_index(args: &Args) -> Result<Option<usize>> {
    Ok(args.strtonum('b', 0, i32::MAX as i64, "buffer")?.map(|n| n as usize))
}

/// Silent errors mean another mode got there first; nothing to report.
fn quiet(r: Result<()>) -> Result<()> {
    match r {
        Err(e) if e.is_silent() => { debug!(error = %e, "chooser not started"); Ok(()) }
        r => r,
    }
}

// ─────────────────────────── choosers ───────────────────────────

fn cmd_choose_window(args: &Args, server: &mut Server, ctx: &mut CmdCtx) -> Result<()> {
    let Some(client) = ctx.curclient.clone() else {
        return Err(CmdError::Failed("must be run interactively".into()));
    };
    let session = client.session().ok_or_else(|| CmdError::not_found("no current session"))?;
    let (_, _, wid) = server.find_window(ctx, args.get('t'))?;
    let format = args.get('F').unwrap_or(DEFAULT_WINDOW_TEMPLATE);
    let template = args.argv.first().map(String::as_str).unwrap_or(DEFAULT_CHOOSE_WINDOW_COMMAND);
    quiet(choose_window(server, &client, &session, wid, format, template))
}

fn cmd_choose_buffer(args: &Args, server: &mut Server, ctx: &mut CmdCtx) -> Result<()> {
    let Some(client) = ctx.curclient.clone() else {
        return Err(CmdError::Failed("must be run interactively".into()));
    };
    let session = client.session().ok_or_else(|| CmdError::not_found("no current session"))?;
    let (_, _, wid) = server.find_window(ctx, args.get('t'))?;
    let format = args.get('F').unwrap_or(DEFAULT_BUFFER_TEMPLATE);
    let template = args.argv.first().map(String::as_str).unwrap_or(DEFAULT_CHOOSE_BUFFER_COMMAND);
    quiet(choose_buffer(server, &client, &session, wid, format, template))
}

// ─────────────────────────── buffers ───────────────────────────

fn cmd_paste_buffer(args: &Args, server: &mut Server, ctx: &mut CmdCtx) -> Result<()> {
    let (_, wid, pid) = server.find_pane(ctx, args.get('t'))?;
    let index = buffer_index(args)?;

    // no top buffer is fine, a missing explicit one is not
    let data = match server.buffers.get(index) {
        Ok(pb) => Some(pb.data().to_vec()),
        Err(e) if index.is_some() => return Err(e),
        Err(_) => None,
    };

    if let Some(data) = data {
        let spec = PasteSeparator::new(args.get('s'), args.has('r'), args.has('p'));
        let window = server.windows.get_mut(&wid)
            .ok_or_else(|| CmdError::not_found(format!("can't find window @{wid}")))?;
        paste_window(window, pid, &data, &spec)?;
    }

    if args.has('d') {
        if let Err(e) = server.buffers.remove(index) {
            debug!(error = %e, "nothing to delete after paste");
        }
    }
    Ok(())
}

fn cmd_set_buffer(args: &Args, server: &mut Server, _ctx: &mut CmdCtx) -> Result<()> {
    let data = args.argv[0].as_bytes().to_vec();
    match buffer_index(args)? {
        Some(i) => server.buffers.replace(i, data),
        None => { server.buffers.push(data); Ok(()) }
    }
}

fn cmd_delete_buffer(args: &Args, server: &mut Server, _ctx: &mut CmdCtx) -> Result<()> {
    server.buffers.remove(buffer_index(args)?).map(|_| ())
}

fn cmd_show_buffer(args: &Args, server: &mut Server, ctx: &mut CmdCtx) -> Result<()> {
    let pb = server.buffers.get(buffer_index(args)?)?;
    let text = String::from_utf8_lossy(pb.data()).into_owned();
    for line in text.lines() { ctx.print(line); }
    Ok(())
}

fn cmd_list_buffers(args: &Args, server: &mut Server, ctx: &mut CmdCtx) -> Result<()> {
    let format = args.get('F').unwrap_or(DEFAULT_BUFFER_TEMPLATE);
    for (i, pb) in server.buffers.iter().enumerate() {
        let mut ft = FormatTree::new();
        ft.add("line", i);
        format_paste_buffer(&mut ft, pb);
        ctx.print(&ft.expand(format));
    }
    Ok(())
}

// ─────────────────────────── windows ───────────────────────────

fn cmd_select_window(args: &Args, server: &mut Server, ctx: &mut CmdCtx) -> Result<()> {
    let (s, idx, _) = server.find_window(ctx, args.get('t'))?;
    let to = if args.has('l') {
        s.last().ok_or_else(|| CmdError::Failed("no last window".into()))?
    } else if args.has('n') {
        s.adjacent(true).ok_or_else(|| CmdError::Failed("no next window".into()))?
    } else if args.has('p') {
        s.adjacent(false).ok_or_else(|| CmdError::Failed("no previous window".into()))?
    } else {
        idx
    };
    if !s.select(to) {
        return Err(CmdError::not_found(format!("can't find window {to}")));
    }
    debug!(session = %s.name, window = to, "window selected");
    Ok(())
}

fn cmd_display_message(args: &Args, server: &mut Server, ctx: &mut CmdCtx) -> Result<()> {
    let (s, idx, wid) = server.find_window(ctx, args.get('t'))?;
    let mut ft = FormatTree::new();
    format_session(&mut ft, &s);
    if let Some(w) = server.window(wid) { format_winlink(&mut ft, &s, idx, w); }
    let msg = ft.expand(args.argv.first().map(String::as_str).unwrap_or(DEFAULT_DISPLAY_TEMPLATE));
    match ctx.curclient.clone() {
        Some(c) if !args.has('p') => c.set_message(&msg),
        _ => ctx.print(&msg),
    }
    Ok(())
}

// ─────────────────────────── options ───────────────────────────

fn cmd_set_option(args: &Args, server: &mut Server, ctx: &mut CmdCtx) -> Result<()> {
    let name = args.argv[0].as_str();
    if WindowOptions::NAMES.contains(&name) {
        return cmd_set_window_option(args, server, ctx);
    }
    if !Options::NAMES.contains(&name) {
        return Err(CmdError::not_found(format!("unknown option: {name}")));
    }
    server.options.set(name, args.argv.get(1).map(String::as_str).unwrap_or(""))?;
    server.apply_options();
    let shown = server.options.get(name).unwrap_or_default();
    ctx.info(&format!("set option: {name} -> {shown}"));
    Ok(())
}

fn cmd_set_window_option(args: &Args, server: &mut Server, ctx: &mut CmdCtx) -> Result<()> {
    let name = args.argv[0].as_str();
    let value = args.argv.get(1).map(String::as_str).unwrap_or("");
    let options = if args.has('g') {
        &mut server.window_defaults
    } else {
        let (_, _, wid) = server.find_window(ctx, args.get('t'))?;
        &mut server.windows.get_mut(&wid)
            .ok_or_else(|| CmdError::not_found(format!("can't find window @{wid}")))?
            .options
    };
    options.set(name, value)?;
    let shown = options.get(name).unwrap_or_default();
    ctx.info(&format!("set option: {name} -> {shown}"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::inject::tests::Capture;
    use crate::types::{Client, Session};

    struct Fixture {
        srv: Server,
        session: Rc<Session>,
        client: Rc<Client>,
        wid: usize,
        panes: Vec<(usize, Capture)>,
    }

    /// One session, window 0 split into two live panes.
    fn fixture() -> Fixture {
        let mut srv = Server::new();
        let session = srv.new_session("main").unwrap();
        let client = srv.new_client("tty1", Some(&session));
        let wid = session.window_at(0).unwrap();
        srv.split_window(wid).unwrap();
        let ids: Vec<usize> = srv.window(wid).unwrap().panes.iter().map(|p| p.id).collect();
        let mut panes = Vec::new();
        for id in ids {
            let cap = Capture::default();
            srv.pane_mut(id).unwrap().set_input(Box::new(cap.clone()));
            panes.push((id, cap));
        }
        Fixture { srv, session, client, wid, panes }
    }

    impl Fixture {
        fn run(&mut self, line: &str) {
            let mut ctx = CmdCtx::for_client(Rc::clone(&self.client));
            self.srv.execute(line, &mut ctx);
        }
        fn written(&self, n: usize) -> Vec<u8> { self.panes[n].1.bytes() }
    }

    #[test]
    fn paste_top_buffer_into_active_pane() {
        let mut f = fixture();
        f.run("set-buffer 'one\ntwo'");
        f.run("paste-buffer");
        assert_eq!(f.written(0), b"one\rtwo");
        assert!(f.written(1).is_empty());
        assert_eq!(f.srv.buffers.len(), 1);
    }

    #[test]
    fn paste_options() {
        let mut f = fixture();
        f.run("set-buffer 'a\nb'");
        f.run("pasteb -r");
        f.run("pasteb -s ', '");
        assert_eq!(f.written(0), b"a\nba, b");
        f.run("pasteb -d -t :0.1");
        assert_eq!(f.written(1), b"a\rb");
        assert!(f.srv.buffers.is_empty());
    }

    #[test]
    fn bracketed_paste_needs_flag_and_program() {
        let mut f = fixture();
        f.run("setb x");
        f.run("pasteb -p");
        assert_eq!(f.written(0), b"x");
        let pid = f.panes[0].0;
        f.srv.pane_mut(pid).unwrap().process_output(b"\x1b[?2004h");
        f.run("pasteb");
        f.run("pasteb -p");
        assert_eq!(f.written(0), b"xx\x1b[200~x\x1b[201~");
    }

    #[test]
    fn synchronized_paste_reaches_siblings() {
        let mut f = fixture();
        f.run("setb hi");
        f.run("setw synchronize-panes on");
        f.run("pasteb");
        assert_eq!(f.written(0), b"hi");
        assert_eq!(f.written(1), b"hi");
        assert!(f.client.message().is_none());
    }

    #[test]
    fn empty_store_paste_is_a_noop() {
        let mut f = fixture();
        f.run("pasteb -d");
        assert!(f.written(0).is_empty());
        assert!(f.client.message().is_none());
    }

    #[test]
    fn buffer_index_errors() {
        let mut f = fixture();
        f.run("setb x");
        f.run("pasteb -b 3");
        assert_eq!(f.client.message().as_deref(), Some("No buffer 3"));
        f.run("pasteb -b 99999999999");
        assert_eq!(f.client.message().as_deref(), Some("Buffer too large"));
        f.run("pasteb -b x");
        assert_eq!(f.client.message().as_deref(), Some("Buffer invalid"));
        assert!(f.written(0).is_empty());
    }

    #[test]
    fn buffer_management() {
        let mut f = fixture();
        f.run("setb first ; setb second");
        f.run("setb -b 1 replaced");
        f.run("lsb -F '#{line}:#{buffer_sample}'");
        assert_eq!(f.client.take_output(), vec!["0:second", "1:replaced"]);
        f.run("deleteb");
        f.run("showb");
        assert_eq!(f.client.take_output(), vec!["replaced"]);
        f.run("deleteb ; deleteb");
        assert_eq!(f.client.message().as_deref(), Some("No buffers"));
    }

    #[test]
    fn buffer_limit_option_trims_store() {
        let mut f = fixture();
        f.run("setb a ; setb b ; setb c");
        f.run("set -g buffer-limit 2");
        assert_eq!(f.srv.buffers.len(), 2);
        assert_eq!(f.srv.buffers.get(Some(1)).unwrap().data(), b"b");
        assert_eq!(f.client.take_output(), vec!["set option: buffer-limit -> 2"]);
        f.run("set -g buffer-limit 0");
        assert_eq!(f.client.message().as_deref(), Some("Value for buffer-limit is too small"));
    }

    #[test]
    fn window_option_scopes() {
        let mut f = fixture();
        f.run("setw -g synchronize-panes on");
        assert!(f.srv.window_defaults.synchronize_panes);
        assert!(!f.srv.window(f.wid).unwrap().options.synchronize_panes);
        let wid = f.srv.new_window(&f.session, "new");
        assert!(f.srv.window(wid).unwrap().options.synchronize_panes);
        f.run("set synchronize-panes -t :0");
        assert!(f.client.message().is_some());
        f.run("set -t :0 synchronize-panes");
        assert!(f.srv.window(f.wid).unwrap().options.synchronize_panes);
        f.run("set no-such-thing 1");
        assert_eq!(f.client.message().as_deref(), Some("Unknown option: no-such-thing"));
    }

    #[test]
    fn select_window_variants() {
        let mut f = fixture();
        f.srv.new_window(&f.session, "two");
        f.srv.new_window(&f.session, "three");
        f.run("selectw -t 2");
        assert_eq!(f.session.current(), Some(2));
        f.run("selectw -n");
        assert_eq!(f.session.current(), Some(0));
        f.run("selectw -p");
        assert_eq!(f.session.current(), Some(2));
        f.run("selectw -l");
        assert_eq!(f.session.current(), Some(0));
        f.run("selectw -t 9");
        assert_eq!(f.client.message().as_deref(), Some("Can't find window 9"));
    }

    #[test]
    fn display_message_expands_formats() {
        let mut f = fixture();
        f.run("display -p '#{session_name}/#{window_index}'");
        assert_eq!(f.client.take_output(), vec!["main/0"]);
        f.run("display");
        assert_eq!(f.client.message().as_deref(), Some("[main] 0:shell"));
    }

    #[test]
    fn choosers_need_a_client() {
        let mut f = fixture();
        let mut ctx = CmdCtx::default();
        f.srv.execute("choose-window", &mut ctx);
        assert_eq!(ctx.errors, vec!["must be run interactively"]);
    }

    #[test]
    fn choose_buffer_then_paste() {
        let mut f = fixture();
        f.run("setb older ; setb newer");
        f.run("choose-buffer");
        let pid = f.panes[0].0;
        assert!(f.srv.pane_mut(pid).unwrap().in_mode());
        f.run("choose-buffer");
        assert!(f.client.message().is_none());
        f.srv.choose_resolve(pid, crate::choose::Choice::Item(2));
        assert_eq!(f.written(0), b"older");
    }

    #[test]
    fn command_client_gets_errors_printed() {
        let mut f = fixture();
        let cmd_client = Client::new(99, "cli");
        let mut ctx = CmdCtx::from_command_client(Rc::clone(&cmd_client), vec!["selectw".into(), "-t".into(), "main:7".into()]);
        f.srv.execute("selectw -t main:7", &mut ctx);
        assert_eq!(cmd_client.take_output(), vec!["can't find window main:7"]);
    }
}
