//! Server-rendered HTML.
//!
//! Every card and row carries `data-kind` / `data-id` so the client script
//! can find it directly when it reconciles a server response.

use chrono::NaiveDate;

use crate::{
    models::{format_hhmm, Event, Task, TaskSummary, User, ADMIN_ROLE},
    validation::{EventPayload, FlexValue, TaskPayload},
};

pub struct PageContext<'a> {
    pub username: &'a str,
    pub is_admin: bool,
}

pub struct DashboardView {
    pub today: NaiveDate,
    pub events_today: Vec<Event>,
    pub tasks_today: Vec<Task>,
    pub week_summary: TaskSummary,
    pub events_tomorrow: i64,
    pub events_this_week: i64,
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn opt(value: Option<&str>) -> String {
    value.map(html_escape).unwrap_or_default()
}

fn flex_to_string(value: Option<&FlexValue>) -> String {
    match value {
        Some(FlexValue::Int(n)) => n.to_string(),
        Some(FlexValue::Text(s)) => s.clone(),
        Some(FlexValue::Bool(b)) => u8::from(*b).to_string(),
        None => String::new(),
    }
}

pub fn layout(title: &str, ctx: Option<&PageContext>, body: &str) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{} · Planner</title>
    <link rel="stylesheet" href="/static/css/planner.css">
</head>
<body>
"#,
        html_escape(title)
    ));

    if let Some(ctx) = ctx {
        html.push_str(r#"<nav class="topbar">
    <a href="/dashboard">Inicio</a>
    <a href="/calendar">Calendario</a>
    <a href="/eventos">Eventos</a>
    <a href="/tareas">Tareas</a>
"#);
        if ctx.is_admin {
            html.push_str("    <a href=\"/admin\">Administración</a>\n");
        }
        html.push_str(&format!(
            "    <span class=\"user\">{}</span>\n    <a href=\"/logout\">Salir</a>\n</nav>\n",
            html_escape(ctx.username)
        ));
    }

    html.push_str("<main>\n");
    html.push_str(body);
    html.push_str(
        r#"
</main>
<div id="overlay-root"></div>
<div id="toasts" aria-live="polite"></div>
<script src="/static/js/planner.js" defer></script>
</body>
</html>
"#,
    );
    html
}

pub fn login_page(error: Option<&str>) -> String {
    let mut body = String::from("<section class=\"login\">\n<h1>Iniciar sesión</h1>\n");
    if let Some(error) = error {
        body.push_str(&format!("<p class=\"error\">{}</p>\n", html_escape(error)));
    }
    body.push_str(
        r#"<form method="post" action="/login">
    <label>Usuario <input type="text" name="usuario" maxlength="50" required autofocus></label>
    <label>Contraseña <input type="password" name="password" maxlength="100" required></label>
    <label class="inline"><input type="checkbox" name="recordar" value="1"> Mantener la sesión</label>
    <button type="submit">Entrar</button>
</form>
</section>"#,
    );
    layout("Iniciar sesión", None, &body)
}

fn event_schedule(event: &Event) -> String {
    let mut text = event.fecha_evento.to_string();
    if let Some(start) = event.hora_evento {
        text.push(' ');
        text.push_str(&format_hhmm(start));
    }
    match (event.fecha_fin, event.hora_fin) {
        (None, None) => {}
        (fin, hora) => {
            text.push_str(" → ");
            if let Some(fin) = fin {
                text.push_str(&fin.to_string());
            }
            if let Some(hora) = hora {
                if fin.is_some() {
                    text.push(' ');
                }
                text.push_str(&format_hhmm(hora));
            }
        }
    }
    text
}

pub fn event_card(event: &Event) -> String {
    format!(
        r#"<article class="card" data-kind="evento" data-id="{id}">
    <h3 data-field="nombre">{nombre}</h3>
    <p class="when" data-field="horario">{horario}</p>
    <p data-field="descripcion">{descripcion}</p>
    <button type="button" class="link" data-action="open-overlay" data-url="/eventos/{id}/ver">Ver</button>
</article>
"#,
        id = event.id,
        nombre = html_escape(&event.nombre),
        horario = html_escape(&event_schedule(event)),
        descripcion = opt(event.descripcion.as_deref()),
    )
}

pub fn task_row(task: &Task) -> String {
    let checked = if task.estado.is_completed() { " checked" } else { "" };
    let done = if task.estado.is_completed() { " done" } else { "" };
    let hora = task.hora_evento.map(format_hhmm).unwrap_or_default();
    format!(
        r#"<li class="task priority-{prioridad}{done}" data-kind="tarea" data-id="{id}">
    <input type="checkbox" data-action="toggle-task" data-url="/tareas/{id}/estado"{checked}>
    <span data-field="nombre">{nombre}</span>
    <span class="due" data-field="fecha_limite">{fecha} {hora}</span>
    <span class="badge" data-field="prioridad">{prioridad_label}</span>
    <span class="state" data-field="estado">{estado}</span>
    <button type="button" class="link" data-action="open-overlay" data-url="/tareas/{id}/ver">Ver</button>
</li>
"#,
        id = task.id,
        prioridad = task.prioridad as i16,
        prioridad_label = task.prioridad.label(),
        nombre = html_escape(&task.nombre),
        fecha = task.fecha_limite,
        hora = hora,
        estado = task.estado.label(),
    )
}

fn summary_counter(summary: &TaskSummary) -> String {
    format!(
        r#"<p class="summary">Tareas completadas esta semana:
    <strong data-counter="completadas">{}</strong> de <strong data-counter="total">{}</strong></p>
"#,
        summary.completadas, summary.total
    )
}

pub fn dashboard_page(ctx: &PageContext, view: &DashboardView) -> String {
    let mut body = format!(
        "<h1>Hoy, {}</h1>\n<section class=\"stats\">\n",
        view.today.format("%d/%m/%Y")
    );
    body.push_str(&summary_counter(&view.week_summary));
    body.push_str(&format!(
        "<p>Eventos mañana: <strong>{}</strong> · Eventos esta semana: <strong>{}</strong></p>\n</section>\n",
        view.events_tomorrow, view.events_this_week
    ));

    body.push_str("<section>\n<h2>Eventos de hoy</h2>\n<div class=\"cards\">\n");
    if view.events_today.is_empty() {
        body.push_str("<p class=\"empty\">No hay eventos para hoy.</p>\n");
    }
    for event in view.events_today.iter().take(5) {
        body.push_str(&event_card(event));
    }
    body.push_str("</div>\n</section>\n");

    body.push_str("<section>\n<h2>Tareas de hoy</h2>\n<ul class=\"tasks\">\n");
    if view.tasks_today.is_empty() {
        body.push_str("<li class=\"empty\">No hay tareas para hoy.</li>\n");
    }
    for task in &view.tasks_today {
        body.push_str(&task_row(task));
    }
    body.push_str("</ul>\n</section>\n");

    layout("Inicio", Some(ctx), &body)
}

pub fn calendar_page(ctx: &PageContext) -> String {
    let body = r#"<h1>Calendario</h1>
<p><a class="button" href="/eventos/nuevo">Nuevo evento</a> <a class="button" href="/tareas/nueva">Nueva tarea</a></p>
<div id="calendar" data-feed-url="/api/eventos"></div>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/fullcalendar@6.1.15/index.global.min.css">
<script src="https://cdn.jsdelivr.net/npm/fullcalendar@6.1.15/index.global.min.js"></script>"#;
    layout("Calendario", Some(ctx), body)
}

pub fn event_list_page(ctx: &PageContext, events: &[Event]) -> String {
    let mut body = String::from(
        r##"<h1>Eventos</h1>
<p><a class="button" href="/eventos/nuevo">Nuevo evento</a></p>
<input type="search" class="filter" data-filter-target="#event-cards" placeholder="Buscar eventos…">
<div class="cards" id="event-cards">
"##,
    );
    if events.is_empty() {
        body.push_str("<p class=\"empty\">Todavía no hay eventos.</p>\n");
    }
    for event in events {
        body.push_str(&event_card(event));
    }
    body.push_str("</div>\n");
    layout("Eventos", Some(ctx), &body)
}

pub fn task_list_page(ctx: &PageContext, tasks: &[Task], summary: &TaskSummary) -> String {
    let mut body = String::from(
        "<h1>Tareas</h1>\n<p><a class=\"button\" href=\"/tareas/nueva\">Nueva tarea</a></p>\n",
    );
    body.push_str(&summary_counter(summary));
    body.push_str(
        r##"<input type="search" class="filter" data-filter-target="#task-list" placeholder="Buscar tareas…">
<ul class="tasks" id="task-list">
"##,
    );
    if tasks.is_empty() {
        body.push_str("<li class=\"empty\">Todavía no hay tareas.</li>\n");
    }
    for task in tasks {
        body.push_str(&task_row(task));
    }
    body.push_str("</ul>\n");
    layout("Tareas", Some(ctx), &body)
}

fn error_banner(error: Option<&str>) -> String {
    error
        .map(|e| format!("<p class=\"error\">{}</p>\n", html_escape(e)))
        .unwrap_or_default()
}

pub fn event_form_page(ctx: &PageContext, payload: &EventPayload, error: Option<&str>) -> String {
    let body = format!(
        r#"<h1>Nuevo evento</h1>
{error}<form method="post" action="/eventos/nuevo" class="entity-form">
    <label>Nombre <input type="text" name="nombre" maxlength="100" required value="{nombre}"></label>
    <label>Descripción <textarea name="descripcion" maxlength="500">{descripcion}</textarea></label>
    <label>Fecha <input type="date" name="fecha_evento" required value="{fecha_evento}"></label>
    <label>Hora <input type="time" name="hora_evento" value="{hora_evento}"></label>
    <label>Fecha fin <input type="date" name="fecha_fin" value="{fecha_fin}"></label>
    <label>Hora fin <input type="time" name="hora_fin" value="{hora_fin}"></label>
    <button type="submit">Guardar</button>
</form>"#,
        error = error_banner(error),
        nombre = opt(payload.nombre.as_deref()),
        descripcion = opt(payload.descripcion.as_deref()),
        fecha_evento = opt(payload.fecha_evento.as_deref()),
        hora_evento = opt(payload.hora_evento.as_deref()),
        fecha_fin = opt(payload.fecha_fin.as_deref()),
        hora_fin = opt(payload.hora_fin.as_deref()),
    );
    layout("Nuevo evento", Some(ctx), &body)
}

fn priority_options(selected: &str) -> String {
    [("1", "Baja"), ("2", "Media"), ("3", "Alta")]
        .iter()
        .map(|(value, label)| {
            let sel = if *value == selected { " selected" } else { "" };
            format!("<option value=\"{value}\"{sel}>{label}</option>")
        })
        .collect()
}

pub fn task_form_page(ctx: &PageContext, payload: &TaskPayload, error: Option<&str>) -> String {
    let prioridad = flex_to_string(payload.prioridad.as_ref());
    let body = format!(
        r#"<h1>Nueva tarea</h1>
{error}<form method="post" action="/tareas/nueva" class="entity-form">
    <label>Nombre <input type="text" name="nombre" maxlength="100" required value="{nombre}"></label>
    <label>Descripción <textarea name="descripcion" maxlength="500">{descripcion}</textarea></label>
    <label>Fecha límite <input type="date" name="fecha_limite" required value="{fecha_limite}"></label>
    <label>Hora <input type="time" name="hora_evento" value="{hora}"></label>
    <label>Prioridad <select name="prioridad">{opciones}</select></label>
    <button type="submit">Guardar</button>
</form>"#,
        error = error_banner(error),
        nombre = opt(payload.nombre.as_deref()),
        descripcion = opt(payload.descripcion.as_deref()),
        fecha_limite = opt(payload.fecha_limite.as_deref()),
        hora = opt(payload.hora_evento.as_deref()),
        opciones = priority_options(if prioridad.is_empty() { "1" } else { &prioridad }),
    );
    layout("Nueva tarea", Some(ctx), &body)
}

/// Overlay for one event: details, an edit form and a delete button.
pub fn event_fragment(event: &Event) -> String {
    let hora = |t: Option<chrono::NaiveTime>| t.map(format_hhmm).unwrap_or_default();
    format!(
        r#"<div class="overlay" data-kind="evento" data-id="{id}" role="dialog" aria-modal="true">
  <div class="overlay-body">
    <button type="button" class="close" data-action="close-overlay" aria-label="Cerrar">×</button>
    <h2>{nombre}</h2>
    <p class="when">{horario}</p>
    <p>{descripcion}</p>
    <form class="overlay-form" data-method="PUT" data-url="/api/eventos/{id}">
      <label>Nombre <input type="text" name="nombre" maxlength="100" required value="{nombre}"></label>
      <label>Descripción <textarea name="descripcion" maxlength="500">{descripcion}</textarea></label>
      <label>Fecha <input type="date" name="fecha_evento" required value="{fecha_evento}"></label>
      <label>Hora <input type="time" name="hora_evento" value="{hora_evento}"></label>
      <label>Fecha fin <input type="date" name="fecha_fin" value="{fecha_fin}"></label>
      <label>Hora fin <input type="time" name="hora_fin" value="{hora_fin}"></label>
      <button type="submit">Guardar cambios</button>
    </form>
    <button type="button" class="danger" data-action="delete" data-url="/eventos/{id}/eliminar">Eliminar</button>
  </div>
</div>
"#,
        id = event.id,
        nombre = html_escape(&event.nombre),
        horario = html_escape(&event_schedule(event)),
        descripcion = opt(event.descripcion.as_deref()),
        fecha_evento = event.fecha_evento,
        hora_evento = hora(event.hora_evento),
        fecha_fin = event.fecha_fin.map(|d| d.to_string()).unwrap_or_default(),
        hora_fin = hora(event.hora_fin),
    )
}

pub fn task_fragment(task: &Task) -> String {
    let estado_options: String = [(0, "Pendiente"), (2, "En progreso"), (1, "Completada")]
        .iter()
        .map(|(value, label)| {
            let sel = if *value == task.estado as i16 { " selected" } else { "" };
            format!("<option value=\"{value}\"{sel}>{label}</option>")
        })
        .collect();
    format!(
        r#"<div class="overlay" data-kind="tarea" data-id="{id}" role="dialog" aria-modal="true">
  <div class="overlay-body">
    <button type="button" class="close" data-action="close-overlay" aria-label="Cerrar">×</button>
    <h2>{nombre}</h2>
    <p class="when">Fecha límite: {fecha} {hora} · Prioridad {prioridad_label} · {estado_label}</p>
    <p>{descripcion}</p>
    <form class="overlay-form" data-method="PUT" data-url="/api/tareas/{id}">
      <label>Nombre <input type="text" name="nombre" maxlength="100" required value="{nombre}"></label>
      <label>Descripción <textarea name="descripcion" maxlength="500">{descripcion}</textarea></label>
      <label>Fecha límite <input type="date" name="fecha_limite" required value="{fecha}"></label>
      <label>Hora <input type="time" name="hora_evento" value="{hora}"></label>
      <label>Prioridad <select name="prioridad">{prioridades}</select></label>
      <label>Estado <select name="estado">{estados}</select></label>
      <button type="submit">Guardar cambios</button>
    </form>
    <button type="button" class="danger" data-action="delete" data-url="/tareas/{id}/eliminar">Eliminar</button>
  </div>
</div>
"#,
        id = task.id,
        nombre = html_escape(&task.nombre),
        descripcion = opt(task.descripcion.as_deref()),
        fecha = task.fecha_limite,
        hora = task.hora_evento.map(format_hhmm).unwrap_or_default(),
        prioridad_label = task.prioridad.label(),
        estado_label = task.estado.label(),
        prioridades = priority_options(&(task.prioridad as i16).to_string()),
        estados = estado_options,
    )
}

pub fn admin_page(ctx: &PageContext, users: &[User], notice: Option<&str>) -> String {
    let mut body = String::from("<h1>Administración</h1>\n");
    if let Some(notice) = notice {
        body.push_str(&format!("<p class=\"notice\">{}</p>\n", html_escape(notice)));
    }

    body.push_str("<section>\n<h2>Usuarios</h2>\n<table>\n<tr><th>Usuario</th><th>Rol</th><th>Alta</th></tr>\n");
    for user in users {
        let role = if user.role >= ADMIN_ROLE {
            "Administrador".to_string()
        } else {
            format!("Nivel {}", user.role)
        };
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            html_escape(&user.username),
            role,
            user.created_at.format("%Y-%m-%d")
        ));
    }
    body.push_str("</table>\n");
    body.push_str(&format!(
        r#"<form method="post" action="/admin/usuarios" class="entity-form">
    <h3>Nuevo usuario</h3>
    <label>Usuario <input type="text" name="usuario" maxlength="50" required></label>
    <label>Contraseña <input type="password" name="password" minlength="8" maxlength="100" required></label>
    <label>Nivel <input type="number" name="rol" min="1" max="{ADMIN_ROLE}" value="1"></label>
    <button type="submit">Crear</button>
</form>
</section>
"#
    ));

    body.push_str(
        r#"<section>
<h2>Limpieza de datos</h2>
<p>Elimina definitivamente los eventos y tareas con fecha anterior al umbral.</p>
<form method="post" action="/admin/limpiar-datos" class="entity-form">
    <label>Días <input type="number" name="dias" min="0" max="3650" value="3"></label>
    <button type="submit" class="danger">Limpiar datos antiguos</button>
</form>
</section>
"#,
    );
    layout("Administración", Some(ctx), &body)
}
