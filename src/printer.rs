//! Debug renderings behind `--debug-tokens` and `--debug-parse`.

use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::token::{Token, TokenKind};

/// Format the token stream as a fixed-width table. The EOF row is omitted.
pub fn render_token_table(tokens: &[Token]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<20}{:<25}LINE\n", "TOKEN TYPE", "LEXEME"));
    out.push_str(&"-".repeat(60));
    out.push('\n');

    for token in tokens {
        if token.kind == TokenKind::Eof {
            break;
        }
        let lexeme = if token.lexeme.is_empty() {
            "N/A"
        } else {
            token.lexeme.as_str()
        };
        out.push_str(&format!(
            "{:<20}{:<25}{}\n",
            token.kind.to_string(),
            lexeme,
            token.line
        ));
    }
    out
}

/// Render the AST as an indented tree, one node per line.
pub fn render_ast(statements: &[Stmt]) -> String {
    let mut out = String::from("AST Root\n");
    for stmt in statements {
        render_stmt(&mut out, stmt, "");
    }
    out
}

fn deeper(indent: &str) -> String {
    format!("{indent}  | ")
}

fn render_stmt(out: &mut String, stmt: &Stmt, indent: &str) {
    let child = deeper(indent);
    match stmt {
        Stmt::Class {
            name,
            superclass,
            methods,
        } => {
            out.push_str(&format!("{indent}[Class] {}", name.lexeme));
            if let Some(superclass) = superclass {
                out.push_str(&format!(" < {}", superclass.lexeme));
            }
            out.push('\n');
            for method in methods {
                render_function(out, method, &child);
            }
        }
        Stmt::Function(declaration) => render_function(out, declaration, indent),
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            out.push_str(&format!("{indent}[If]\n"));
            out.push_str(&format!("{child}Condition:\n"));
            render_expr(out, condition, &deeper(&child));
            out.push_str(&format!("{child}Then:\n"));
            for stmt in then_branch {
                render_stmt(out, stmt, &deeper(&child));
            }
            if !else_branch.is_empty() {
                out.push_str(&format!("{child}Else:\n"));
                for stmt in else_branch {
                    render_stmt(out, stmt, &deeper(&child));
                }
            }
        }
        Stmt::While { condition, body } => {
            out.push_str(&format!("{indent}[While]\n"));
            out.push_str(&format!("{child}Condition:\n"));
            render_expr(out, condition, &deeper(&child));
            out.push_str(&format!("{child}Body:\n"));
            for stmt in body {
                render_stmt(out, stmt, &deeper(&child));
            }
        }
        Stmt::ForIn {
            variable,
            iterable,
            body,
        } => {
            out.push_str(&format!("{indent}[ForIn] {}\n", variable.lexeme));
            out.push_str(&format!("{child}Iterable:\n"));
            render_expr(out, iterable, &deeper(&child));
            out.push_str(&format!("{child}Body:\n"));
            for stmt in body {
                render_stmt(out, stmt, &deeper(&child));
            }
        }
        Stmt::Return { value, .. } => {
            out.push_str(&format!("{indent}[Return]\n"));
            if let Some(value) = value {
                render_expr(out, value, &child);
            }
        }
        Stmt::Print { value, .. } => {
            out.push_str(&format!("{indent}[Print]\n"));
            render_expr(out, value, &child);
        }
        Stmt::Expression(expr) => {
            out.push_str(&format!("{indent}[ExprStmt]\n"));
            render_expr(out, expr, &child);
        }
        Stmt::Block(statements) => {
            out.push_str(&format!("{indent}[Block]\n"));
            for stmt in statements {
                render_stmt(out, stmt, &child);
            }
        }
    }
}

fn render_function(out: &mut String, declaration: &FunctionDecl, indent: &str) {
    let params: Vec<&str> = declaration
        .params
        .iter()
        .map(|param| param.lexeme.as_str())
        .collect();
    out.push_str(&format!(
        "{indent}[Function] {}({})\n",
        declaration.name.lexeme,
        params.join(", ")
    ));
    let child = deeper(indent);
    for stmt in &declaration.body {
        render_stmt(out, stmt, &child);
    }
}

fn render_expr(out: &mut String, expr: &Expr, indent: &str) {
    let child = deeper(indent);
    match expr {
        Expr::Binary { left, op, right } => {
            out.push_str(&format!("{indent}Binary ({})\n", op.lexeme));
            render_expr(out, left, &child);
            render_expr(out, right, &child);
        }
        Expr::Assign { target, value } => {
            out.push_str(&format!("{indent}Assign (=)\n"));
            out.push_str(&format!("{child}Target:\n"));
            render_expr(out, target, &deeper(&child));
            out.push_str(&format!("{child}Value:\n"));
            render_expr(out, value, &deeper(&child));
        }
        Expr::Literal(token) => {
            out.push_str(&format!("{indent}Literal: {}\n", token.lexeme));
        }
        Expr::Variable(token) => {
            out.push_str(&format!("{indent}Var: {}\n", token.lexeme));
        }
        Expr::Call { callee, args, .. } => {
            out.push_str(&format!("{indent}Call\n"));
            out.push_str(&format!("{child}Callee:\n"));
            render_expr(out, callee, &deeper(&child));
            out.push_str(&format!("{child}Args:\n"));
            for arg in args {
                render_expr(out, arg, &deeper(&child));
            }
        }
        Expr::Get { object, name } => {
            out.push_str(&format!("{indent}Get Property: .{}\n", name.lexeme));
            render_expr(out, object, &child);
        }
        Expr::ArrayAccess { array, index, .. } => {
            out.push_str(&format!("{indent}Array Index []\n"));
            out.push_str(&format!("{child}Array:\n"));
            render_expr(out, array, &deeper(&child));
            out.push_str(&format!("{child}Index:\n"));
            render_expr(out, index, &deeper(&child));
        }
        Expr::ArrayLit(elements) => {
            out.push_str(&format!("{indent}Array Literal []\n"));
            for element in elements {
                render_expr(out, element, &child);
            }
        }
        Expr::New { class_name, args } => {
            out.push_str(&format!("{indent}New {}\n", class_name.lexeme));
            for arg in args {
                render_expr(out, arg, &child);
            }
        }
    }
}
