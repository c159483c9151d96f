//! 桶文件行格式
//!
//! 每行一条记录：`文档路径,句柄[,会话ID]`，逗号分隔。
//! 字段内的逗号与反斜杠用 `\` 转义，路径含逗号也能往返。
//! 以 `#` 开头的行是头部/注释，读取方一律忽略。

use zsync_core::identity::EntityIdentity;

/// 字段分隔符
const DELIMITER: char = ',';

/// 转义字符
const ESCAPE: char = '\\';

/// 编码一条记录为一行（不含换行符）
pub fn encode_record(identity: &EntityIdentity) -> String {
    let mut line = String::new();
    line.push_str(&escape_field(&identity.document_path));
    line.push(DELIMITER);
    line.push_str(&escape_field(&identity.handle));
    if let Some(session) = &identity.session_id {
        line.push(DELIMITER);
        line.push_str(&escape_field(session));
    }
    line
}

/// 解码一行；头部行、空行与畸形行返回 `None`
pub fn decode_record(line: &str) -> Option<EntityIdentity> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') {
        return None;
    }

    let fields = split_fields(line);
    if fields.len() < 2 || fields.len() > 3 {
        return None;
    }
    if fields[0].is_empty() || fields[1].is_empty() {
        return None;
    }

    let mut identity = EntityIdentity::new(fields[0].clone(), fields[1].clone());
    if let Some(session) = fields.get(2) {
        if !session.is_empty() {
            identity = identity.with_session(session.clone());
        }
    }
    Some(identity)
}

fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        if c == DELIMITER || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// 按未转义的分隔符切分，同时还原转义
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in line.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == DELIMITER {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}
