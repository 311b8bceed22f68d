use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{
    bracketed, parse::Parse, parse::ParseStream, parse_macro_input, Attribute, Expr, Field,
    Generics, Ident, Token, Visibility,
};

enum ParsingDirective {
    Magic { typ: syn::Type, val: syn::Expr },
    Ignore { typ: syn::Type },
    Padding { num_bytes: syn::Expr },
    Param { typ: syn::Type, name: syn::Ident },
    SizePrefix {
        typ: syn::Type,
        name: syn::Ident,
        magic: Option<(syn::Type, syn::Expr)>,
    },
}

/*

pub struct FrameHeader {
    [[size_prefix: u32 = frame_size, magic: u16 = 0xF1FA]]
    pub old_chunks: u16,
    [[padding_bytes = 2]]
    [[param: u16 = name_len]]
}
*/

impl Parse for ParsingDirective {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let outer;
        bracketed!(outer in input);
        let inner;
        bracketed!(inner in outer);
        let ident = inner.parse::<Ident>()?;
        let directive = Self::parse_body(&ident, &inner)?;
        if !inner.is_empty() {
            return Err(inner.error("unexpected tokens after directive"));
        }
        if !outer.is_empty() {
            return Err(outer.error("directives are written as [[name ...]]"));
        }
        Ok(directive)
    }
}

impl ParsingDirective {
    fn parse_body(ident: &Ident, input: ParseStream) -> syn::Result<Self> {
        match ident.to_string().as_str() {
            "magic" => {
                input.parse::<Token![:]>()?;
                let typ: syn::Type = input.parse()?;
                input.parse::<Token![=]>()?;
                let val: syn::Expr = input.parse()?;
                Ok(Self::Magic { typ, val })
            }
            "padding_bytes" => {
                input.parse::<Token![=]>()?;
                let num_bytes: syn::Expr = input.parse()?;
                Ok(Self::Padding { num_bytes })
            }
            "ignore" => {
                input.parse::<Token![:]>()?;
                let typ: syn::Type = input.parse()?;
                Ok(Self::Ignore { typ })
            }
            "param" => {
                input.parse::<Token![:]>()?;
                let typ: syn::Type = input.parse()?;
                input.parse::<Token![=]>()?;
                let name: syn::Ident = input.parse()?;
                Ok(Self::Param { typ, name })
            }
            "size_prefix" => {
                input.parse::<Token![:]>()?;
                let typ: syn::Type = input.parse()?;
                input.parse::<Token![=]>()?;
                let name: syn::Ident = input.parse()?;
                let mut magic = None;
                if input.peek(Token![,]) {
                    input.parse::<Token![,]>()?;
                    let key = input.parse::<Ident>()?;
                    if key != "magic" {
                        return Err(syn::Error::new(key.span(), "expected `magic`"));
                    }
                    input.parse::<Token![:]>()?;
                    let magic_typ: syn::Type = input.parse()?;
                    input.parse::<Token![=]>()?;
                    let val: syn::Expr = input.parse()?;
                    magic = Some((magic_typ, val));
                }
                Ok(Self::SizePrefix { typ, name, magic })
            }
            _ => Err(syn::Error::new(ident.span(), "unknown parsing directive")),
        }
    }

    fn as_tokens(&self) -> proc_macro2::TokenStream {
        match self {
            ParsingDirective::Magic { typ, val } => magic_check(typ, val),
            ParsingDirective::Padding { num_bytes } => {
                quote! {
                    input.skip(#num_bytes as usize)?;
                }
            }
            ParsingDirective::Param { typ, name } => {
                quote! {
                    let #name = input.read_type::<#typ>()?;
                }
            }
            ParsingDirective::Ignore { typ } => {
                quote! {
                    input.read_type::<#typ>()?;
                }
            }
            // The declared size counts the size field (and the magic, if
            // any) itself; everything the record leaves unread inside that
            // span is dropped with it. The magic is checked before the span
            // is taken.
            ParsingDirective::SizePrefix { typ, name, magic } => {
                let (check, prefix_len) = match magic {
                    Some((magic_typ, val)) => (
                        magic_check(magic_typ, val),
                        quote! {
                            ::core::mem::size_of::<#typ>() + ::core::mem::size_of::<#magic_typ>()
                        },
                    ),
                    None => (
                        proc_macro2::TokenStream::new(),
                        quote! { ::core::mem::size_of::<#typ>() },
                    ),
                };
                quote! {
                    let #name = input.read_type::<#typ>()?;
                    #check
                    let mut input = {
                        let declared = #name as usize;
                        let span = declared
                            .checked_sub(#prefix_len)
                            .ok_or(::parsing::Error::SizeFieldTooSmall { declared })?;
                        input.read_bytes(span)?
                    };
                }
            }
        }
    }
}

fn magic_check(typ: &syn::Type, val: &syn::Expr) -> proc_macro2::TokenStream {
    quote! {
        {
            let magic = input.read_type::<#typ>()?;
            if magic != #val {
                return Err(::parsing::Error::MagicCheckFailed {
                    expected: (#val) as u64,
                    found: magic as u64,
                });
            }
        }
    }
}

struct FieldStruct {
    name: Ident,
    read_type: syn::Type,
    option: Option<syn::Expr>,
    e: FieldEnum,
}

enum FieldEnum {
    Normal,
    SizedUtf8String(syn::Expr),
    SizedBuf(syn::Expr),
    RestOfBuf,
    Collection {
        field_ty: syn::Type,
        num_elems: syn::Expr,
    },
}

impl FieldStruct {
    fn from_field(field: &Field) -> syn::Result<Self> {
        let Some(name) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "only named fields are supported"));
        };
        Ok(Self {
            name,
            read_type: field.ty.clone(),
            option: None,
            e: FieldEnum::Normal,
        })
    }

    /*
    #[parse(sized_utf8_string = param_name)]
     */
    fn apply_attr(&mut self, attr: &Attribute, field_ty: &syn::Type) -> syn::Result<()> {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("sized_utf8_string") {
                let size: Expr = meta.value()?.parse()?;
                self.e = FieldEnum::SizedUtf8String(size);
            } else if meta.path.is_ident("sized_buf") {
                let size: Expr = meta.value()?.parse()?;
                self.e = FieldEnum::SizedBuf(size);
            } else if meta.path.is_ident("rest_of_buf") {
                self.e = FieldEnum::RestOfBuf;
            } else if meta.path.is_ident("collection") {
                meta.input.parse::<Token![:]>()?;
                let ty = meta.input.parse::<syn::Type>()?;
                meta.input.parse::<Token![=]>()?;
                let num_elems = meta.input.parse::<Expr>()?;
                self.read_type = ty;
                self.e = FieldEnum::Collection {
                    field_ty: field_ty.clone(),
                    num_elems,
                };
            } else if meta.path.is_ident("option_if") {
                meta.input.parse::<Token![:]>()?;
                let ty = meta.input.parse::<syn::Type>()?;
                meta.input.parse::<Token![=]>()?;
                let if_expr = meta.input.parse::<Expr>()?;
                self.read_type = ty;
                self.option = Some(if_expr);
            } else {
                return Err(meta.error("unsupported parse attribute"));
            }
            Ok(())
        })
    }

    fn as_tokens(&self) -> proc_macro2::TokenStream {
        let read = match &self.e {
            FieldEnum::Normal => {
                let ty = &self.read_type;
                quote! {input.read_type::<#ty>()?}
            }
            FieldEnum::SizedUtf8String(size) => {
                quote! {
                    {
                        let bytes = input.read_bytes(#size as usize)?;
                        ::core::str::from_utf8(bytes)
                            .map_err(::parsing::Error::InterpretStrFailed)?
                            .into()
                    }
                }
            }
            FieldEnum::SizedBuf(size) => {
                quote! {input.read_bytes(#size as usize)?.into()}
            }
            FieldEnum::RestOfBuf => {
                quote! {input.read_rest().into()}
            }
            FieldEnum::Collection {
                field_ty,
                num_elems,
            } => {
                let item_ty = &self.read_type;
                quote! {
                    {
                        let items: ::parsing::Result<#field_ty> = (0..#num_elems)
                            .map(|_| input.read_type::<#item_ty>())
                            .collect();
                        items?
                    }
                }
            }
        };
        let name = &self.name;
        if let Some(e) = &self.option {
            quote! {
                let #name = if #e {
                    Some(#read)
                } else {
                    None
                };
            }
        } else {
            quote! {
                let #name = #read;
            }
        }
    }
}

enum FieldOrDirective {
    Field(FieldStruct),
    Directive(ParsingDirective),
}

impl FieldOrDirective {
    fn as_tokens(&self) -> proc_macro2::TokenStream {
        match self {
            FieldOrDirective::Directive(thing) => thing.as_tokens(),
            FieldOrDirective::Field(field) => field.as_tokens(),
        }
    }
}

struct ParsedStruct {
    s: syn::ItemStruct,
    things: Vec<FieldOrDirective>,
}

impl Parse for ParsedStruct {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let struct_attrs = input.call(Attribute::parse_outer)?;
        let vis = input.parse::<Visibility>()?;
        let struct_token = input.parse::<Token![struct]>()?;
        let name = input.parse::<Ident>()?;
        let mut generics = input.parse::<Generics>()?;
        if input.peek(Token![where]) {
            generics.where_clause = Some(input.parse::<syn::WhereClause>()?)
        };

        let braced_input;
        let brace_token = syn::braced!(braced_input in input);
        let input = braced_input;

        let mut fields = syn::punctuated::Punctuated::<Field, Token![,]>::new();
        let mut parsing_things = Vec::new();

        while !input.is_empty() {
            if input.peek(syn::token::Bracket) {
                let directive = input.parse::<ParsingDirective>()?;
                parsing_things.push(FieldOrDirective::Directive(directive));
                continue;
            }

            let mut field = input.call(Field::parse_named)?;
            let mut field_thing = FieldStruct::from_field(&field)?;
            let field_ty = field.ty.clone();
            let mut err = Ok(());
            field.attrs.retain(|attr| {
                if attr.path().is_ident("parse") {
                    if let Err(e) = field_thing.apply_attr(attr, &field_ty) {
                        err = Err(e);
                    }
                    false
                } else {
                    true
                }
            });
            err?;
            parsing_things.push(FieldOrDirective::Field(field_thing));
            fields.push(field);
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        let fields = syn::FieldsNamed {
            brace_token,
            named: fields,
        };

        let s = syn::ItemStruct {
            attrs: struct_attrs,
            vis,
            struct_token,
            ident: name,
            generics,
            fields: syn::Fields::Named(fields),
            semi_token: None,
        };

        Ok(Self {
            s,
            things: parsing_things,
        })
    }
}

fn add_extra_lifetime_and_bound_generics(
    generics: &syn::Generics,
    lifetime: &syn::Lifetime,
    f: impl FnOnce(syn::ImplGenerics, syn::TypeGenerics, Option<&syn::WhereClause>),
) {
    let mut generics_mod = generics.clone();

    generics_mod.params.insert(
        0,
        syn::GenericParam::Lifetime(syn::LifetimeParam::new(lifetime.clone())),
    );

    let mut bounds = syn::punctuated::Punctuated::new();
    for l in generics.lifetimes() {
        bounds.push(l.lifetime.clone());
    }

    if !bounds.is_empty() {
        generics_mod
            .make_where_clause()
            .predicates
            .push(syn::WherePredicate::Lifetime(syn::PredicateLifetime {
                lifetime: lifetime.clone(),
                colon_token: syn::token::Colon::default(),
                bounds,
            }));
    }

    let (impl_generics, _ty_generics, where_clause) = generics_mod.split_for_impl();
    let (_impl_generics, ty_generics, _where_clause) = generics.split_for_impl();
    f(impl_generics, ty_generics, where_clause);
}

fn generate_parse_impl<'f>(
    things: &[FieldOrDirective],
    struct_name: &Ident,
    generics: &Generics,
    field_names: impl Iterator<Item = &'f Ident>,
) -> proc_macro2::TokenStream {
    let parsing: Vec<_> = things.iter().map(FieldOrDirective::as_tokens).collect();
    let field_names: Vec<_> = field_names.collect();

    let parse_lifetime = syn::Lifetime::new("'parse", Span::call_site());

    let mut out = proc_macro2::TokenStream::new();

    add_extra_lifetime_and_bound_generics(
        generics,
        &parse_lifetime,
        |impl_generics, ty_generics, where_clause| {
            out = quote! {
                impl #impl_generics ::parsing::Parse<#parse_lifetime> for #struct_name #ty_generics #where_clause {
                    fn parse(input: &mut impl ::parsing::ReadBytes<#parse_lifetime>) -> ::parsing::Result<Self> {
                        #[allow(unused_imports)]
                        use ::parsing::ReadBytes as _;
                        #(
                            #parsing
                        )*
                        Ok(Self {
                            #(
                                #field_names
                            ),*
                        })
                    }
                }
            };
        },
    );
    out
}

/// Declares a struct together with its little-endian `Parse` impl.
/// Fields are read in declaration order, interleaved with directives:
/// ```ignore
/// parsable_struct! {
///     pub struct Header {
///         [[magic: u32 = 0x0401]]
///         pub field1: u16,
///         [[padding_bytes = 4]]
///         pub field2: u8,
///         [[param: u32 = size_of_something]]
///         [[ignore: u16]]
///     }
/// }
/// ```
/// `padding_bytes` and `ignore` consume bytes that never reach the struct.
/// `magic` is consumed the same way, but a mismatch fails the parse with
/// `Error::MagicCheckFailed`.
/// `[[param: <int type> = <name>]]` reads an int that later fields can use
/// (string lengths, counts) without adding it to the struct.
///
/// Size-prefixed records
/// ```ignore
/// parsable_struct! {
///     pub struct Chunk<'a> {
///         [[size_prefix: u32 = chunk_size]]
///         pub chunk_type: u16,
///         #[parse(rest_of_buf)]
///         pub data: &'a [u8],
///     }
/// }
/// ```
/// `size_prefix` reads a total size that includes the size field itself and
/// narrows the cursor to that span. Whatever the following fields leave unread
/// is skipped, so the caller always resumes at the declared end.
/// `[[size_prefix: u32 = frame_size, magic: u16 = 0xF1FA]]` also checks a
/// magic number stored right after the size, before the span is taken; the
/// declared size then counts the magic too.
///
/// Sized strings and buffers
/// ```ignore
/// parsable_struct! {
///     pub struct Named<'a> {
///         [[param: u16 = name_len]]
///         #[parse(sized_utf8_string = name_len)]
///         pub name: &'a str,
///     }
/// }
/// ```
/// `.into()` is called on the slice, so anything implementing `From<&str>`
/// (or `From<&[u8]>` for `sized_buf`) can be the field type.
///
/// Collections and optional fields
/// ```ignore
/// parsable_struct! {
///     pub struct Table<'a> {
///         [[param: u16 = num_items]]
///         #[parse(collection: Item<'a> = num_items)]
///         pub items: Vec<Item<'a>>,
///         pub kind: u16,
///         #[parse(option_if: u32 = kind == 2)]
///         pub extra: Option<u32>,
///     }
/// }
/// ```
/// `.collect()` is called on the item iterator, so the field does not have to
/// be a `Vec`.
#[proc_macro]
pub fn parsable_struct(input: TokenStream) -> TokenStream {
    let parsed = parse_macro_input!(input as ParsedStruct);
    let struct_def = &parsed.s;
    let parse_impl = generate_parse_impl(
        &parsed.things,
        &struct_def.ident,
        &struct_def.generics,
        struct_def.fields.iter().filter_map(|f| f.ident.as_ref()),
    );
    let expanded = quote! {
        #struct_def
        #parse_impl
    };
    TokenStream::from(expanded)
}

/// A simpler version of parsable_struct! for records without directives
#[proc_macro_derive(Parse)]
pub fn parse_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as syn::DeriveInput);
    let syn::Data::Struct(syn::DataStruct {
        fields: syn::Fields::Named(named),
        ..
    }) = &input.data
    else {
        return syn::Error::new_spanned(&input.ident, "Parse can only be derived for structs with named fields")
            .to_compile_error()
            .into();
    };
    let things: syn::Result<Vec<_>> = named
        .named
        .iter()
        .map(|field| FieldStruct::from_field(field).map(FieldOrDirective::Field))
        .collect();
    let things = match things {
        Ok(things) => things,
        Err(err) => return err.to_compile_error().into(),
    };
    TokenStream::from(generate_parse_impl(
        &things,
        &input.ident,
        &input.generics,
        named.named.iter().filter_map(|f| f.ident.as_ref()),
    ))
}
