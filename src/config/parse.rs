use config_lexer::{Block, ConfigError, Directive, Loc, Node};

use crate::http::request::Method;

use super::types::{Config, LocationBlock, ServerBlock, ServerName};

pub fn parse_config(source: &str) -> Result<Config, ConfigError> {
    let nodes = config_lexer::parse(source)?;
    let mut config = Config::new();

    for node in &nodes {
        match node {
            Node::Block(block) if block.name == "server" => {
                config.push(parse_server_block(block)?);
            }
            Node::Block(block) => {
                return Err(err(block.loc, format!("unexpected top-level block '{}'", block.name)));
            }
            Node::Directive(d) => {
                return Err(err(d.loc, format!("unexpected top-level directive '{}'", d.name)));
            }
        }
    }

    if config.endpoints.is_empty() {
        return Err(err(Loc::start(), "no 'server' blocks found in configuration"));
    }

    Ok(config)
}

fn err(loc: Loc, message: impl Into<String>) -> ConfigError {
    ConfigError {
        message: message.into(),
        loc,
        context: vec!["server".to_string()],
    }
}

fn parse_server_block(block: &Block) -> Result<ServerBlock, ConfigError> {
    let mut server = ServerBlock::new();
    let mut default_host = "0.0.0.0".to_string();
    // listen entries recorded with the host token they were written with, so
    // a later `host` directive can still backfill bare-port `listen` lines.
    let mut listen_tokens: Vec<(Option<String>, u16)> = Vec::new();

    for node in &block.body {
        match node {
            Node::Directive(d) if d.name == "listen" => {
                let arg = require_one_arg(d)?;
                listen_tokens.push(parse_listen(arg, d.loc)?);
            }
            Node::Directive(d) if d.name == "host" => {
                default_host = require_one_arg(d)?.clone();
            }
            Node::Directive(d) => apply_server_directive(&mut server, d)?,
            Node::Block(b) if b.name == "location" => {
                let loc = parse_location_block(b)?;
                server.locations.insert(loc.path.clone(), loc);
            }
            Node::Block(b) => {
                return Err(ConfigError {
                    message: format!("unexpected block '{}' inside server", b.name),
                    loc: b.loc,
                    context: vec!["server".to_string()],
                });
            }
        }
    }

    if listen_tokens.is_empty() {
        return Err(ConfigError {
            message: "server block has no 'listen' directive".to_string(),
            loc: block.loc,
            context: vec!["server".to_string()],
        });
    }
    server.listen = listen_tokens
        .into_iter()
        .map(|(host, port)| (host.unwrap_or_else(|| default_host.clone()), port))
        .collect();

    Ok(server)
}

fn apply_server_directive(server: &mut ServerBlock, d: &Directive) -> Result<(), ConfigError> {
    match d.name.as_str() {
        "server_name" => {
            if d.args.is_empty() {
                return Err(directive_err(d, "server_name requires at least one argument"));
            }
            for raw in &d.args {
                server.server_names.push(parse_server_name(raw));
            }
        }
        "root" => {
            server.root = require_one_arg(d)?.clone();
        }
        "index" => {
            server.index = Some(require_one_arg(d)?.clone());
        }
        "error_page" => {
            if d.args.len() < 2 {
                return Err(directive_err(d, "error_page requires >= 2 tokens"));
            }
            let path = d.args.last().unwrap().clone();
            for code_tok in &d.args[..d.args.len() - 1] {
                let code: u16 = code_tok
                    .parse()
                    .map_err(|_| directive_err(d, format!("invalid HTTP code '{code_tok}'")))?;
                server.error_pages.insert(code, path.clone());
            }
        }
        "client_max_body_size" => {
            server.client_max_body_size = parse_size(require_one_arg(d)?)
                .ok_or_else(|| directive_err(d, "invalid size"))?;
        }
        other => return Err(directive_err(d, format!("unknown server directive '{other}'"))),
    }
    Ok(())
}

fn parse_location_block(block: &Block) -> Result<LocationBlock, ConfigError> {
    let path = block
        .args
        .first()
        .cloned()
        .ok_or_else(|| ConfigError {
            message: "location requires a path argument".to_string(),
            loc: block.loc,
            context: vec!["server".to_string(), "location".to_string()],
        })?;
    let mut loc = LocationBlock::new(path);
    loc.allowed_methods.clear();

    for node in &block.body {
        match node {
            Node::Directive(d) => apply_location_directive(&mut loc, d)?,
            Node::Block(b) => {
                return Err(ConfigError {
                    message: format!("unexpected nested block '{}' inside location", b.name),
                    loc: b.loc,
                    context: vec!["server".to_string(), "location".to_string()],
                });
            }
        }
    }

    if loc.allowed_methods.is_empty() {
        loc.allowed_methods.push(Method::Get);
    }
    Ok(loc)
}

fn apply_location_directive(loc: &mut LocationBlock, d: &Directive) -> Result<(), ConfigError> {
    match d.name.as_str() {
        "root" => loc.root = Some(require_one_arg(d)?.clone()),
        "index" => loc.index = Some(require_one_arg(d)?.clone()),
        "methods" => {
            if d.args.is_empty() {
                return Err(directive_err(d, "methods requires at least one argument"));
            }
            for tok in &d.args {
                let method = parse_method(tok)
                    .ok_or_else(|| directive_err(d, format!("unknown method '{tok}'")))?;
                loc.allowed_methods.push(method);
            }
        }
        "autoindex" => loc.autoindex = parse_bool(require_one_arg(d)?)
            .ok_or_else(|| directive_err(d, "autoindex expects on|off"))?,
        "upload_store" => loc.upload_store = Some(require_one_arg(d)?.clone()),
        "upload_enable" => loc.upload_enable = parse_bool(require_one_arg(d)?)
            .ok_or_else(|| directive_err(d, "upload_enable expects on|off"))?,
        "return" => {
            if d.args.is_empty() {
                return Err(directive_err(d, "return requires a target"));
            }
            loc.redirection = Some(parse_return(d)?);
        }
        "cgi_ext" => loc.cgi_extension = Some(require_one_arg(d)?.clone()),
        "cgi_path" => loc.cgi_path = Some(require_one_arg(d)?.clone()),
        "client_max_body_size" => {
            loc.client_max_body_size =
                Some(parse_size(require_one_arg(d)?).ok_or_else(|| directive_err(d, "invalid size"))?);
        }
        other => return Err(directive_err(d, format!("unknown location directive '{other}'"))),
    }
    Ok(())
}

fn parse_return(d: &Directive) -> Result<(u16, String), ConfigError> {
    const VALID: [u16; 5] = [301, 302, 303, 307, 308];
    if d.args.len() == 1 {
        return Ok((302, d.args[0].clone()));
    }
    let code: u16 = d.args[0]
        .parse()
        .map_err(|_| directive_err(d, "return code must be numeric"))?;
    if !VALID.contains(&code) {
        return Err(directive_err(d, format!("invalid redirect code {code}")));
    }
    Ok((code, d.args[1].clone()))
}

fn parse_listen(token: &str, loc: Loc) -> Result<(Option<String>, u16), ConfigError> {
    match token.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().map_err(|_| ConfigError {
                message: format!("invalid port in '{token}'"),
                loc,
                context: vec!["server".to_string()],
            })?;
            Ok((Some(host.to_string()), port))
        }
        None => {
            let port: u16 = token.parse().map_err(|_| ConfigError {
                message: format!("invalid listen value '{token}'"),
                loc,
                context: vec!["server".to_string()],
            })?;
            Ok((None, port))
        }
    }
}

fn parse_server_name(raw: &str) -> ServerName {
    if raw == "*" {
        ServerName::Any
    } else if let Some(suffix) = raw.strip_prefix("*.") {
        ServerName::WildcardSuffix(format!(".{suffix}"))
    } else {
        ServerName::Exact(raw.to_string())
    }
}

fn parse_method(tok: &str) -> Option<Method> {
    match tok {
        "GET" => Some(Method::Get),
        "POST" => Some(Method::Post),
        "DELETE" => Some(Method::Delete),
        "PUT" => Some(Method::Put),
        "HEAD" => Some(Method::Head),
        "OPTIONS" => Some(Method::Options),
        "PATCH" => Some(Method::Patch),
        _ => None,
    }
}

fn parse_bool(tok: &str) -> Option<bool> {
    match tok {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// Parses a size with optional `k`/`m`/`g` suffix (case-insensitive).
pub fn parse_size(tok: &str) -> Option<usize> {
    let tok = tok.trim();
    let (digits, mult) = match tok.chars().last() {
        Some(c) if c.eq_ignore_ascii_case(&'k') => (&tok[..tok.len() - 1], 1024),
        Some(c) if c.eq_ignore_ascii_case(&'m') => (&tok[..tok.len() - 1], 1024 * 1024),
        Some(c) if c.eq_ignore_ascii_case(&'g') => (&tok[..tok.len() - 1], 1024 * 1024 * 1024),
        _ => (tok, 1),
    };
    digits.parse::<usize>().ok().map(|n| n * mult)
}

fn require_one_arg(d: &Directive) -> Result<&String, ConfigError> {
    d.args
        .first()
        .ok_or_else(|| directive_err(d, format!("'{}' requires an argument", d.name)))
}

fn directive_err(d: &Directive, message: impl Into<String>) -> ConfigError {
    ConfigError {
        message: message.into(),
        loc: d.loc,
        context: vec!["server".to_string()],
    }
}
