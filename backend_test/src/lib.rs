use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, ItemFn, Pat, PathArguments,
    Signature, Type,
};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that the database is dropped regardless of how the test terminates.
///
/// Injectable dependencies, in any order, are
/// [`rocket::local::asynchronous::Client`], [`mongodb::Database`],
/// `crate::voting::Coordinator`, `crate::voting::TestClock`, and any number of
/// `crate::model::mongodb::Coll<T>`. The client, the coordinator and the
/// clock all share the same fresh database and the same time.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        return syn::Error::new(
            TokenStream2::from(args).span(),
            "`backend_test` takes no arguments",
        )
        .into_compile_error()
        .into();
    }
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn __backend_test_setup() -> (
                rocket::local::asynchronous::Client,
                mongodb::Database,
                crate::voting::Coordinator,
                crate::voting::TestClock,
            ) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["ballot_box_backend"],
                    None,
                    None,
                );

                let db_client = crate::db_client().await;
                let db = db_client.database(&crate::database());
                crate::prepare_database(&db).await;

                let clock = crate::voting::TestClock::default();
                let coordinator = crate::voting::Coordinator::new(
                    db_client,
                    db.clone(),
                    std::sync::Arc::new(clock.clone()),
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_coordinator(coordinator.clone()),
                )
                .await
                .unwrap();

                (rocket_client, db, coordinator, clock)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn __backend_test_cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (rocket_client, db, coordinator, clock) = outer_runtime.block_on(__backend_test_setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let injected_mutex = std::sync::Mutex::new((rocket_client, db.clone(), coordinator, clock));
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let (rocket_client, db, coordinator, clock) = injected_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup.
            outer_runtime.block_on(__backend_test_cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, and map each parameter to the expression
/// that injects it. Unknown and repeated parameters are rejected.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut seen = Vec::new();
    let mut args = vec![];

    for input in &sig.inputs {
        let FnArg::Typed(pat_type) = input else {
            return Err(syn::Error::new(input.span(), "Test cannot take `self`"));
        };
        let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) else {
            return Err(unexpected(input));
        };
        // Valid as the last path segment for any type is itself.
        let Some(last) = type_path.path.segments.last() else {
            return Err(unexpected(input));
        };

        let injected = match last.ident.to_string().as_str() {
            "Client" => quote! { rocket_client },
            "Database" => quote! { db.clone() },
            "Coordinator" => quote! { coordinator.clone() },
            "TestClock" => quote! { clock.clone() },
            "Coll" => {
                let PathArguments::AngleBracketed(generics) = &last.arguments else {
                    return Err(unexpected(input));
                };
                let Some(GenericArgument::Type(Type::Path(item_type))) = generics.args.first()
                else {
                    return Err(unexpected(input));
                };
                args.push(quote! { crate::model::mongodb::Coll::<#item_type>::from_db(&db) });
                continue;
            }
            _ => return Err(unexpected(input)),
        };

        let kind = last.ident.to_string();
        if seen.contains(&kind) {
            return Err(syn::Error::new(
                input.span(),
                format!("Test cannot accept more than one `{kind}`"),
            ));
        }
        seen.push(kind);
        args.push(injected);
    }

    Ok(args)
}

fn unexpected(input: &FnArg) -> syn::Error {
    syn::Error::new(
        input.span(),
        "Expected one of `Client`, `Database`, `Coordinator`, `TestClock` or `Coll<T>`",
    )
}
