use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use fuelsync_core::{Msg, TaskKind};

pub const HELP: &str = "\
命令:
  tab <hy|cz>              切换当前任务
  upload <文件> [hy|cz]     上传源数据表
  run [hy|cz]              启动汇总任务
  preview [hy|cz]          加载结果预览
  sheet <N>                查看当前预览的第 N 个工作表
  download [hy|cz]         下载汇总报表
  probe                    测试服务器连接
  server <URL>             更换服务器地址
  clear                    清空日志
  help                     显示本帮助
  quit                     退出
省略任务类型时使用当前任务。";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Msg(Msg),
    Help,
    Quit,
}

/// Turns one typed line into input; `current` fills in an omitted task type.
pub fn parse_line(line: &str, current: TaskKind) -> Result<Option<ConsoleInput>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let kind_arg = |arg: Option<&&str>| -> Result<TaskKind, String> {
        match arg {
            Some(code) => code.parse().map_err(|err| format!("{err}")),
            None => Ok(current),
        }
    };

    let input = match command.to_ascii_lowercase().as_str() {
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" | "q" => ConsoleInput::Quit,
        "probe" => ConsoleInput::Msg(Msg::ProbeClicked),
        "clear" => ConsoleInput::Msg(Msg::ClearLogs),
        "tab" => {
            let Some(code) = rest.first() else {
                return Err("用法: tab <hy|cz>".to_string());
            };
            ConsoleInput::Msg(Msg::TabSelected(kind_arg(Some(code))?))
        }
        "run" => ConsoleInput::Msg(Msg::RunClicked(kind_arg(rest.first())?)),
        "preview" => ConsoleInput::Msg(Msg::PreviewRequested(kind_arg(rest.first())?)),
        "download" => ConsoleInput::Msg(Msg::DownloadRequested(kind_arg(rest.first())?)),
        "upload" => {
            let Some(path) = rest.first() else {
                return Err("用法: upload <文件> [hy|cz]".to_string());
            };
            ConsoleInput::Msg(Msg::UploadRequested {
                kind: kind_arg(rest.get(1))?,
                path: PathBuf::from(path),
            })
        }
        "sheet" => {
            let index = rest
                .first()
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n >= 1)
                .ok_or_else(|| "用法: sheet <N>，N 从 1 开始".to_string())?;
            ConsoleInput::Msg(Msg::SheetSelected {
                kind: current,
                index: index - 1,
            })
        }
        "server" => {
            let Some(url) = rest.first() else {
                return Err("用法: server <URL>".to_string());
            };
            ConsoleInput::Msg(Msg::ServerUrlChanged((*url).to_string()))
        }
        other => return Err(format!("未知命令: {other}（输入 help 查看帮助）")),
    };
    Ok(Some(input))
}

/// Forwards stdin lines until EOF; the channel closes when stdin does.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(line: &str) -> Result<Option<ConsoleInput>, String> {
        parse_line(line, TaskKind::Cz)
    }

    #[test]
    fn omitted_type_uses_current_tab() {
        assert_eq!(
            parse("run").unwrap(),
            Some(ConsoleInput::Msg(Msg::RunClicked(TaskKind::Cz)))
        );
        assert_eq!(
            parse("preview hy").unwrap(),
            Some(ConsoleInput::Msg(Msg::PreviewRequested(TaskKind::Hy)))
        );
    }

    #[test]
    fn upload_takes_path_then_type() {
        assert_eq!(
            parse("upload ./一月化验.xlsx hy").unwrap(),
            Some(ConsoleInput::Msg(Msg::UploadRequested {
                kind: TaskKind::Hy,
                path: PathBuf::from("./一月化验.xlsx"),
            }))
        );
        assert!(parse("upload").is_err());
    }

    #[test]
    fn sheet_numbers_start_at_one() {
        assert_eq!(
            parse("sheet 2").unwrap(),
            Some(ConsoleInput::Msg(Msg::SheetSelected {
                kind: TaskKind::Cz,
                index: 1,
            }))
        );
        assert!(parse("sheet 0").is_err());
        assert!(parse("sheet x").is_err());
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(parse("   ").unwrap(), None);
        assert!(parse("launch").unwrap_err().contains("launch"));
        assert!(parse("tab xx").is_err());
        assert_eq!(parse("QUIT").unwrap(), Some(ConsoleInput::Quit));
    }
}
